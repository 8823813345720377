use std::env;
use std::fs;
use std::path::Path;

fn main() {
    let out_dir = env::var("OUT_DIR").unwrap();
    let catalogue_path = Path::new(&out_dir).join("version_catalogue.rs");

    // Read the API version catalogue from Cargo.toml metadata
    let cargo_manifest = env::var("CARGO_MANIFEST_DIR").unwrap();
    let cargo_toml_path = Path::new(&cargo_manifest).join("Cargo.toml");
    let cargo_toml_content = fs::read_to_string(&cargo_toml_path)
        .expect("Failed to read Cargo.toml");

    let cargo_toml: toml::Value = cargo_toml_content.parse()
        .expect("Failed to parse Cargo.toml");

    let metadata = cargo_toml
        .get("package")
        .and_then(|p| p.get("metadata"))
        .and_then(|m| m.get("plinth"))
        .expect("Failed to find package.metadata.plinth in Cargo.toml");

    let versions: Vec<String> = metadata
        .get("api_versions")
        .and_then(|v| v.as_array())
        .expect("Failed to find package.metadata.plinth.api_versions in Cargo.toml")
        .iter()
        .map(|v| v.as_str().expect("api_versions entries must be strings").to_string())
        .collect();

    let current = metadata
        .get("current")
        .and_then(|v| v.as_str())
        .expect("Failed to find package.metadata.plinth.current in Cargo.toml");

    let current_ordinal = versions
        .iter()
        .position(|v| v == current)
        .expect("package.metadata.plinth.current must be listed in api_versions");

    let labels = versions
        .iter()
        .map(|v| format!("{:?}", v))
        .collect::<Vec<_>>()
        .join(", ");

    let catalogue_content = format!(
        "// Auto-generated API version catalogue from Cargo.toml metadata\n\
         // Source: package.metadata.plinth.api_versions / package.metadata.plinth.current\n\
         pub const API_VERSION_LABELS: &[&str] = &[{}];\n\
         pub const CURRENT_API_VERSION_ORDINAL: usize = {};\n",
        labels, current_ordinal
    );

    fs::write(&catalogue_path, catalogue_content)
        .expect("Failed to write version_catalogue.rs");

    // Tell cargo to rerun if Cargo.toml changes
    println!("cargo:rerun-if-changed=Cargo.toml");
}
