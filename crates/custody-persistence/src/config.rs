//! Carga de configuración desde variables de entorno.
//! Usa convención `DATABASE_URL` y parámetros opcionales de pool; el directorio
//! de exportación se toma de `CUSTODY_EXPORT_DIR`.

use std::env;
use std::path::PathBuf;

use dotenvy::dotenv;
use once_cell::sync::Lazy;

use crate::error::PersistenceError;

// Carga perezosa del archivo .env una sola vez.
static DOTENV_LOADED: Lazy<()> = Lazy::new(|| {
    let _ = dotenv(); // ignora error si no existe .env
});

pub const DEFAULT_EXPORT_DIR: &str = "pick_sheet_logs";

#[derive(Debug, Clone)]
pub struct DbConfig {
    pub url: String,
    pub min_connections: u32,
    pub max_connections: u32,
}

fn env_u32(name: &str, default: u32) -> u32 {
    env::var(name).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

impl DbConfig {
    pub fn from_env() -> Result<Self, PersistenceError> {
        // asegura que .env se haya cargado
        Lazy::force(&DOTENV_LOADED);
        let url = env::var("DATABASE_URL").map_err(|_| PersistenceError::Config("DATABASE_URL no definido".into()))?;
        Ok(Self { url,
                  min_connections: env_u32("DATABASE_MIN_CONNECTIONS", 2),
                  max_connections: env_u32("DATABASE_MAX_CONNECTIONS", 16) })
    }
}

/// Destino del espejo CSV mensual.
#[derive(Debug, Clone)]
pub struct ExportConfig {
    pub dir: PathBuf,
}

impl ExportConfig {
    pub fn from_env() -> Self {
        Lazy::force(&DOTENV_LOADED);
        let dir = env::var("CUSTODY_EXPORT_DIR").ok()
                                                .filter(|v| !v.trim().is_empty())
                                                .unwrap_or_else(|| DEFAULT_EXPORT_DIR.to_string());
        Self { dir: PathBuf::from(dir) }
    }
}

/// Forzar carga temprana de .env desde aplicaciones externas si se desea.
pub fn init_dotenv() {
    Lazy::force(&DOTENV_LOADED);
}
