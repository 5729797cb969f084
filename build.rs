// build.rs: expose the compile-time target triple as a rustc env var.
//
// The installer picks its platform family (bootstrap/b2 command names, default
// prefix and toolset, recursive-delete strategy) from `env!("TARGET")`.

fn main() {
    let target = std::env::var("TARGET")
        .expect("TARGET env var not set by Cargo. This should never happen in a normal build.");

    println!("cargo:rustc-env=TARGET={target}");
}
