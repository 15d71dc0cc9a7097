// 构建脚本: ez-ffmpeg 静态链接所需的系统库
fn main() {
    // 仅 Windows MSVC 下 vcpkg 静态 FFmpeg 需要额外链接
    #[cfg(all(target_os = "windows", target_env = "msvc"))]
    {
        // 片段解码依赖的 x264 / QSV
        for lib in ["libmfx", "libx264", "oleaut32", "vfw32", "secur32"] {
            println!("cargo:rustc-link-lib=dylib={}", lib);
        }
    }
}
