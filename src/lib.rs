//! Backend translating typed SSA-form IR modules into Jasmin-syntax
//! assembly for the JVM.
//!
//! The pipeline is: parse a textual IR module (`ir::parse`), then run the
//! per-module / per-function emitter (`backend::JvmWriter`) which writes a
//! stack-machine assembly listing referencing the `lljvm/runtime` support
//! classes by symbolic name. The listing is assembled to a class file by an
//! external tool; no binary output is produced here.

pub mod backend;
pub mod common;
pub mod driver;
pub mod ir;

/// Shared entry point for the command-line binary. The emitter treats every
/// unsupported IR construct as fatal and reports it by panicking with a
/// one-line diagnostic, so the real work runs on a joined thread and the
/// panic payload is turned into an ordinary stderr message + exit code 1.
pub fn backend_main() {
    env_logger::init();

    let handler = std::thread::Builder::new()
        .name("emit".to_string())
        .spawn(|| {
            let opts = driver::cli::Options::from_args();
            driver::run(&opts)
        })
        .expect("failed to spawn emitter thread");

    match handler.join() {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            eprintln!("lljvm-backend: error: {}", e);
            std::process::exit(1);
        }
        Err(e) => {
            if let Some(s) = e.downcast_ref::<&str>() {
                eprintln!("lljvm-backend: {}", s);
            } else if let Some(s) = e.downcast_ref::<String>() {
                eprintln!("lljvm-backend: {}", s);
            } else {
                eprintln!("lljvm-backend: internal error");
            }
            std::process::exit(1);
        }
    }
}
