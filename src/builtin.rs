//! Commands the shell runs itself, without a child process.

use std::env;
use std::io::{self, Write};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin { Exit, Pwd, Clear, Cd, Environ, SetEnv, UnsetEnv }

/// What the dispatcher should do after a builtin ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow { Status(i32), Exit(i32) }

impl Builtin {
    pub fn lookup(name: &str) -> Option<Self> {
        Some(match name {
            "exit" => Builtin::Exit,
            "pwd" => Builtin::Pwd,
            "clear" => Builtin::Clear,
            "cd" => Builtin::Cd,
            "environ" => Builtin::Environ,
            "setenv" => Builtin::SetEnv,
            "unsetenv" => Builtin::UnsetEnv,
            _ => return None,
        })
    }

    /// `args` excludes the builtin's own name.
    pub fn run(self, args: &[String], last_status: i32) -> Flow {
        match self {
            Builtin::Exit => exit(args, last_status),
            Builtin::Pwd => pwd(),
            Builtin::Clear => clear(),
            Builtin::Cd => cd(args),
            Builtin::Environ => environ(),
            Builtin::SetEnv => setenv(args),
            Builtin::UnsetEnv => unsetenv(args),
        }
    }
}

fn exit(args: &[String], last_status: i32) -> Flow {
    match args.first().map(|s| s.parse::<i32>()) {
        None => Flow::Exit(last_status),
        Some(Ok(code)) => Flow::Exit(code),
        Some(Err(_)) => { eprintln!("wish: exit: {}: numeric argument required", args[0]); Flow::Status(2) }
    }
}

fn pwd() -> Flow {
    match env::current_dir() {
        Ok(dir) => { println!("{}", dir.display()); Flow::Status(0) }
        Err(e) => { eprintln!("wish: pwd: {e}"); Flow::Status(1) }
    }
}

fn clear() -> Flow {
    let mut out = io::stdout();
    let _ = out.write_all(b"\x1b[H\x1b[2J\x1b[3J");
    let _ = out.flush();
    Flow::Status(0)
}

fn cd(args: &[String]) -> Flow {
    let target = match args.first() {
        Some(dir) => PathBuf::from(dir),
        None => PathBuf::from(env::var_os("HOME").unwrap_or_else(|| "/".into())),
    };
    match env::set_current_dir(&target) {
        Ok(()) => Flow::Status(0),
        Err(_) => { eprintln!("wish: cd: {}: no such directory", target.display()); Flow::Status(1) }
    }
}

fn environ() -> Flow {
    let mut out = io::stdout().lock();
    for (k, v) in env::vars_os() {
        if writeln!(out, "{}={}", k.to_string_lossy(), v.to_string_lossy()).is_err() { return Flow::Status(1); }
    }
    Flow::Status(0)
}

/// `std::env` panics on these, so they are rejected up front.
fn valid_name(name: &str) -> bool { !name.is_empty() && !name.contains(['=', '\0']) }

fn setenv(args: &[String]) -> Flow {
    let Some(name) = args.first() else { eprintln!("wish: setenv: not enough arguments"); return Flow::Status(1) };
    let value = args.get(1).map(String::as_str).unwrap_or("");
    if !valid_name(name) || value.contains('\0') { eprintln!("wish: setenv: invalid variable '{name}'"); return Flow::Status(1); }
    if env::var_os(name).is_some() { println!("Variable overwritten"); } else { println!("Variable created"); }
    env::set_var(name, value);
    Flow::Status(0)
}

fn unsetenv(args: &[String]) -> Flow {
    let Some(name) = args.first() else { eprintln!("wish: unsetenv: not enough arguments"); return Flow::Status(1) };
    if !valid_name(name) { eprintln!("wish: unsetenv: invalid variable '{name}'"); return Flow::Status(1); }
    if env::var_os(name).is_some() {
        env::remove_var(name);
        println!("Variable deleted");
    } else {
        println!("Variable does not exist");
    }
    Flow::Status(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(v: &[&str]) -> Vec<String> { v.iter().map(|x| x.to_string()).collect() }

    #[test]
    fn lookup_known_and_unknown() {
        assert_eq!(Builtin::lookup("cd"), Some(Builtin::Cd));
        assert_eq!(Builtin::lookup("environ"), Some(Builtin::Environ));
        assert_eq!(Builtin::lookup("ls"), None);
    }

    #[test]
    fn exit_codes() {
        assert_eq!(Builtin::Exit.run(&[], 7), Flow::Exit(7));
        assert_eq!(Builtin::Exit.run(&s(&["3"]), 0), Flow::Exit(3));
        assert_eq!(Builtin::Exit.run(&s(&["x"]), 0), Flow::Status(2));
    }

    #[test]
    fn setenv_and_unsetenv() {
        let name = "WISH_BUILTIN_TEST_VAR";
        assert_eq!(Builtin::SetEnv.run(&s(&[name, "v1"]), 0), Flow::Status(0));
        assert_eq!(env::var(name).as_deref(), Ok("v1"));
        assert_eq!(Builtin::SetEnv.run(&s(&[name]), 0), Flow::Status(0));
        assert_eq!(env::var(name).as_deref(), Ok(""));
        assert_eq!(Builtin::UnsetEnv.run(&s(&[name]), 0), Flow::Status(0));
        assert!(env::var_os(name).is_none());
    }

    #[test]
    fn setenv_rejects_bad_input() {
        assert_eq!(Builtin::SetEnv.run(&[], 0), Flow::Status(1));
        assert_eq!(Builtin::SetEnv.run(&s(&["A=B", "c"]), 0), Flow::Status(1));
        assert_eq!(Builtin::UnsetEnv.run(&[], 0), Flow::Status(1));
    }
}
