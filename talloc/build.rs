use std::env;
use std::path::PathBuf;

fn main() {
    let include_dir =
        env::var("TALLOC_INCLUDE_DIR").unwrap_or("/usr/include".to_string());
    let header = format!("{}/talloc.h", include_dir);

    let bindings = bindgen::Builder::default()
        .blocklist_function("qgcvt")
        .blocklist_function("qgcvt_r")
        .blocklist_function("qfcvt")
        .blocklist_function("qfcvt_r")
        .blocklist_function("qecvt")
        .blocklist_function("qecvt_r")
        .blocklist_function("strtold")
        .allowlist_function("talloc_named_const")
        .allowlist_function("_talloc_free")
        .allowlist_function("talloc_total_blocks")
        .allowlist_type("TALLOC_CTX")
        .generate_comments(false)
        .clang_arg(format!("-I{}", include_dir))
        .header(header.as_str())
        .parse_callbacks(Box::new(bindgen::CargoCallbacks::new()))
        .generate()
        .expect("Unable to generate bindings");
    println!("cargo:rerun-if-changed={}", header);
    println!("cargo:rerun-if-env-changed=TALLOC_INCLUDE_DIR");
    println!("cargo:rerun-if-env-changed=TALLOC_LIB_DIR");

    let out_path = PathBuf::from(env::var("OUT_DIR").unwrap());
    bindings
        .write_to_file(out_path.join("bindings.rs"))
        .expect("Couldn't write bindings!");

    if let Ok(lib_dir) = env::var("TALLOC_LIB_DIR") {
        println!("cargo:rustc-link-search=native={}", lib_dir);
    }
    println!("cargo:rustc-link-lib=talloc");
}
