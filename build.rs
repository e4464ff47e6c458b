//! Compiles the MPI shim in `csrc/` when the `mpi` feature is enabled.
//!
//! MPI is located, first match wins, through pkg-config (`MPI_PKG_CONFIG`,
//! then the usual package names), the compiler wrapper (`MPICC`, default
//! `mpicc`), and finally an install prefix (`MPI_HOME`, `CRAY_MPICH_DIR` or a
//! standard location holding `include/mpi.h`).

use std::env;
use std::path::{Path, PathBuf};
use std::process::Command;

const PKG_NAMES: [&str; 3] = ["mpich", "ompi", "mpi"];
const PREFIX_VARS: [&str; 2] = ["MPI_HOME", "CRAY_MPICH_DIR"];
const PREFIXES: [&str; 4] = ["/usr", "/usr/local", "/opt/mpich", "/opt/openmpi"];

/// Flags needed to compile against and link with MPI.
#[derive(Default)]
struct MpiFlags {
    includes: Vec<PathBuf>,
    lib_dirs: Vec<PathBuf>,
    libs: Vec<String>,
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    if env::var_os("CARGO_FEATURE_MPI").is_none() {
        return;
    }

    println!("cargo:rerun-if-changed=csrc/inbibw.c");
    println!("cargo:rerun-if-changed=csrc/inbibw.h");
    for var in ["MPI_PKG_CONFIG", "MPICC"].iter().chain(&PREFIX_VARS) {
        println!("cargo:rerun-if-env-changed={var}");
    }

    let Some((source, flags)) = locate_mpi() else {
        panic!(
            "The `mpi` feature needs an MPI installation (MPICH or Open MPI). Set \
             MPI_PKG_CONFIG to its pkg-config name, put `mpicc` on PATH (or set MPICC), \
             or point MPI_HOME at its prefix. Build without `--features mpi` to use the \
             in-process transport only."
        );
    };
    eprintln!("Found MPI via {source}");

    let mut build = cc::Build::new();
    build
        .file("csrc/inbibw.c")
        .include("csrc")
        .includes(&flags.includes)
        .warnings(true)
        .extra_warnings(true);
    if env::var("PROFILE").is_ok_and(|profile| profile == "release") {
        build.opt_level(3);
    }
    build.compile("inbibw");

    for dir in &flags.lib_dirs {
        println!("cargo:rustc-link-search=native={}", dir.display());
        // The binary must load the libmpi it was linked against.
        println!("cargo:rustc-link-arg=-Wl,-rpath,{}", dir.display());
    }
    for lib in &flags.libs {
        println!("cargo:rustc-link-lib={lib}");
    }
}

fn locate_mpi() -> Option<(String, MpiFlags)> {
    let pkg_names = env::var("MPI_PKG_CONFIG")
        .into_iter()
        .chain(PKG_NAMES.iter().map(|name| name.to_string()));
    for name in pkg_names {
        if let Ok(lib) = pkg_config::Config::new().cargo_metadata(false).probe(&name) {
            let flags = MpiFlags {
                includes: lib.include_paths,
                lib_dirs: lib.link_paths,
                libs: lib.libs,
            };
            return Some((format!("pkg-config {name} {}", lib.version), flags));
        }
    }

    let mpicc = env::var("MPICC").unwrap_or_else(|_| "mpicc".to_string());
    if let Some(flags) = wrapper_flags(&mpicc) {
        return Some((mpicc, flags));
    }

    let prefixes = PREFIX_VARS
        .iter()
        .filter_map(|var| env::var(var).ok())
        .chain(PREFIXES.iter().map(|prefix| prefix.to_string()));
    for prefix in prefixes {
        let prefix = Path::new(&prefix);
        if prefix.join("include/mpi.h").exists() {
            let flags = MpiFlags {
                includes: vec![prefix.join("include")],
                lib_dirs: vec![prefix.join("lib")],
                libs: vec!["mpi".to_string()],
            };
            return Some((prefix.display().to_string(), flags));
        }
    }
    None
}

/// Flags reported by an MPI compiler wrapper. MPICH and Cray answer
/// `-show`, Open MPI answers `-showme`.
fn wrapper_flags(mpicc: &str) -> Option<MpiFlags> {
    let output = ["-show", "-showme"].iter().find_map(|flag| {
        Command::new(mpicc)
            .arg(flag)
            .output()
            .ok()
            .filter(|output| output.status.success())
    })?;

    let mut flags = MpiFlags::default();
    for word in String::from_utf8_lossy(&output.stdout).split_whitespace() {
        if let Some(dir) = word.strip_prefix("-I") {
            flags.includes.push(dir.into());
        } else if let Some(dir) = word.strip_prefix("-L") {
            flags.lib_dirs.push(dir.into());
        } else if let Some(lib) = word.strip_prefix("-l") {
            flags.libs.push(lib.to_string());
        }
    }
    if flags.libs.is_empty() {
        flags.libs.push("mpi".to_string());
    }
    Some(flags)
}
