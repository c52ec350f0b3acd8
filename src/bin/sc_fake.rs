//! Fake compiler installed by the control channel.
//!
//! Records its arguments and stdin next to its own executable and replays the
//! programmed stdout/stderr for the current slot. Not meant to be run directly.

use std::env;
use std::io;
use std::process;

use simple_test::channel::agent;

fn main() {
    let args: Vec<String> = env::args_os().skip(1).map(|a| a.to_string_lossy().into_owned()).collect();

    let dir = match env::current_exe() {
        Ok(exe) => match exe.parent() {
            Some(dir) => dir.to_path_buf(),
            None => fail("executable has no parent directory"),
        },
        Err(e) => fail(&format!("cannot locate own executable: {}", e)),
    };

    let stdin = io::stdin();
    let stdout = io::stdout();
    let stderr = io::stderr();
    if let Err(e) = agent::serve(&dir, &args, &mut stdin.lock(), &mut stdout.lock(), &mut stderr.lock()) {
        fail(&e.to_string());
    }
}

fn fail(message: &str) -> ! {
    eprintln!("sc-fake: {}", message);
    process::exit(2);
}
