//! Bakes the uplink endpoint into the firmware image.
//!
//! Values come from the environment or a `.env` file next to the workspace.

const UPLINK_VARS: [&str; 3] = ["SOILMON_BASE_URL", "SOILMON_API_KEY", "SOILMON_TABLE"];

fn main() {
    if let Ok(path) = dotenvy::dotenv() {
        println!("cargo:rerun-if-changed={}", path.display());
    }

    for var in UPLINK_VARS {
        println!("cargo:rerun-if-env-changed={var}");
        let value = std::env::var(var).unwrap_or_else(|_| {
            println!("cargo:warning={var} is not set, uploads will fail");
            String::new()
        });
        println!("cargo:rustc-env={var}={value}");
    }
}
