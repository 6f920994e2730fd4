use std::env;
use std::fs;
use std::path::Path;

fn main() {
    // Create encoder config template if it doesn't exist
    let out_dir = env::var("OUT_DIR").unwrap_or_else(|_| "./".to_string());
    let template_path = Path::new(&out_dir).join("../../../encoder.template.conf");
    if template_path.exists() {
        println!("cargo:rerun-if-changed=build.rs");
        return;
    }

    let template = r#"# tsmeta encoder configuration template
# Copy this file to 'encoder.conf' and load it with config::options_from_file

# Nominal access unit rate, 1 to 60
rate = 25

# Write a PAT/PMT pair every N packets (takes precedence over psi_secs)
# psi_packets = 7

# Write a PAT/PMT pair every N seconds
# psi_secs = 2
"#;

    let _ = fs::write(template_path, template);
    println!("cargo:rerun-if-changed=build.rs");
}
