use std::env;

use crate::constants::envvars;

pub fn load_dotenv() {
    if dotenv::dotenv().is_ok() {
        println!("Loaded local .env")
    }
    // Fills in whatever the local .env left unset
    if let Ok(path) = env::var(envvars::DOTENV_PATH) {
        if dotenv::from_path(&path).is_ok() {
            println!("Loaded {path}");
        }
    }
}
