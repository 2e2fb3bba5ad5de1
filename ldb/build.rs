use std::env;
use std::path::PathBuf;

fn main() {
    let include_dir = env::var("LDB_INCLUDE_DIR")
        .unwrap_or("/usr/include/samba-4.0".to_string());
    let ldb_header = format!("{}/ldb.h", include_dir);
    let ldb_module_header = format!("{}/ldb_module.h", include_dir);

    let bindings = bindgen::Builder::default()
        .blocklist_function("qgcvt")
        .blocklist_function("qgcvt_r")
        .blocklist_function("qfcvt")
        .blocklist_function("qfcvt_r")
        .blocklist_function("qecvt")
        .blocklist_function("qecvt_r")
        .blocklist_function("strtold")
        .allowlist_function("ldb_.*")
        .allowlist_type("ldb_.*")
        .allowlist_var("LDB_.*")
        .generate_comments(false)
        .clang_arg(format!("-I{}", include_dir))
        .header(ldb_header.as_str())
        .header(ldb_module_header.as_str())
        .parse_callbacks(Box::new(bindgen::CargoCallbacks::new()))
        .generate()
        .expect("Unable to generate bindings");
    println!("cargo:rerun-if-changed={}", ldb_header);
    println!("cargo:rerun-if-changed={}", ldb_module_header);
    println!("cargo:rerun-if-env-changed=LDB_INCLUDE_DIR");
    println!("cargo:rerun-if-env-changed=LDB_LIB_DIR");

    let out_path = PathBuf::from(env::var("OUT_DIR").unwrap());
    bindings
        .write_to_file(out_path.join("bindings.rs"))
        .expect("Couldn't write bindings!");

    if let Ok(lib_dir) = env::var("LDB_LIB_DIR") {
        println!("cargo:rustc-link-search=native={}", lib_dir);
    }
    println!("cargo:rustc-link-lib=ldb");
}
