use std::env;
use std::path::PathBuf;
use std::process::Command;

// Kernel sources and the PTX files `src/backend/cuda/kernels/mod.rs` embeds.
const KERNELS: [(&str, &str); 3] = [
    ("src/backend/cuda/kernels/elementwise.cu", "elementwise.ptx"),
    ("src/backend/cuda/kernels/strided.cu", "strided.ptx"),
    ("src/backend/cuda/kernels/reduction.cu", "reduction.ptx"),
];

fn find_nvcc() -> PathBuf {
    // `which` first for cross-platform lookup, then CUDA_PATH, then common install roots
    if let Ok(path) = which::which("nvcc") {
        return path;
    }
    if let Ok(cuda_path) = env::var("CUDA_PATH") {
        return PathBuf::from(cuda_path).join("bin").join("nvcc");
    }
    ["/usr/local/cuda/bin/nvcc", "/opt/cuda/bin/nvcc"]
        .iter()
        .map(PathBuf::from)
        .find(|p| p.exists())
        .expect("nvcc not found. Ensure CUDA Toolkit is installed and nvcc is in PATH, or set CUDA_PATH.")
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    if env::var("CARGO_FEATURE_CUDA").is_err() {
        return;
    }

    println!("cargo:rerun-if-env-changed=CUDA_PATH");
    let nvcc_path = find_nvcc();
    println!("cargo:warning=Using nvcc found at: {:?}", nvcc_path);

    let out_dir = PathBuf::from(env::var("OUT_DIR").expect("OUT_DIR is set by cargo"));

    for (src_path, ptx_filename) in KERNELS {
        let ptx_path = out_dir.join(ptx_filename);
        let status = Command::new(&nvcc_path)
            .arg("--ptx") // Output PTX assembly
            .arg("-O3")
            .arg("-o")
            .arg(&ptx_path)
            .arg(src_path)
            .status()
            .unwrap_or_else(|e| panic!("Failed to execute nvcc for {}: {}", src_path, e));

        if !status.success() {
            panic!("nvcc failed to compile {}", src_path);
        }
        println!("cargo:rerun-if-changed={}", src_path);
    }
}
