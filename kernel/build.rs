use std::env;
use std::fs;
use std::io::Write;

fn main() {
    let outdir = env::var("OUT_DIR").unwrap();
    let outfile = format!("{}/timestamp.txt", outdir);

    let mut fh = fs::File::create(&outfile).unwrap();
    write!(fh, "{}", chrono::Local::now().format("%Y-%m-%d %H:%M:%S %z")).ok();

    // Host builds (unit tests) link normally; only the bare-metal image needs the script.
    let bare_metal = env::var("CARGO_CFG_TARGET_OS").map_or(false, |os| os == "none");
    if env::var_os("CARGO_FEATURE_BSP_RPI").is_none() || !bare_metal {
        return;
    }

    let manifest_dir = env::var("CARGO_MANIFEST_DIR").unwrap();
    let ld_script = format!("{}/src/bsp/rpi/kernel.ld", manifest_dir);

    println!("cargo:rustc-link-arg-bins=-T{}", ld_script);
    println!("cargo:rerun-if-changed={}", ld_script);
    println!("cargo:rerun-if-changed=build.rs");
}
