//! Multi-database shell.

use crate::commands::document_to_display;
use blazedb_core::MountManager;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

const HELP: &str = "\
commands:
  list                              mounted databases
  mount <name> <path> <password>    open and select a database
  use <name>                        select a mounted database
  current                           show the selection
  all                               list documents of the current database
  unmount <name>                    drop a mount (no on-disk effect)
  help                              this text
  exit                              leave the shell";

/// Runs the multi-database shell.
pub fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut manager = MountManager::new();
    println!("blazedb manager; type 'help' for commands");

    let stdin = io::stdin();
    loop {
        print!("manager> ");
        io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let parts: Vec<&str> = line.split_whitespace().collect();
        let Some((&command, args)) = parts.split_first() else {
            continue;
        };

        let outcome = match command {
            "exit" | "quit" => break,
            "help" => {
                println!("{HELP}");
                Ok(())
            }
            "list" => list(&manager),
            "mount" => mount(&mut manager, args),
            "use" => use_database(&mut manager, args),
            "current" => current(&manager),
            "all" => all(&manager),
            "unmount" => unmount(&mut manager, args),
            other => Err(format!("unknown command {other:?}; try 'help'")),
        };

        if let Err(message) = outcome {
            println!("error: {message}");
        }
    }

    manager.flush_all()?;
    manager.unmount_all();
    Ok(())
}

fn list(manager: &MountManager) -> Result<(), String> {
    let names = manager.names();
    if names.is_empty() {
        println!("no databases mounted");
        return Ok(());
    }
    for name in names {
        let marker = if manager.current_name() == Some(name.as_str()) {
            "*"
        } else {
            " "
        };
        println!("{marker} {name}");
    }
    Ok(())
}

fn mount(manager: &mut MountManager, args: &[&str]) -> Result<(), String> {
    let [name, path, password] = args else {
        return Err("usage: mount <name> <path> <password>".to_string());
    };
    manager
        .mount(*name, PathBuf::from(path), password)
        .map_err(|err| err.to_string())?;
    println!("mounted {name}");
    Ok(())
}

fn use_database(manager: &mut MountManager, args: &[&str]) -> Result<(), String> {
    let [name] = args else {
        return Err("usage: use <name>".to_string());
    };
    manager.use_database(name).map_err(|err| err.to_string())?;
    println!("using {name}");
    Ok(())
}

fn current(manager: &MountManager) -> Result<(), String> {
    match manager.current_name() {
        Some(name) => println!("{name}"),
        None => println!("no database selected"),
    }
    Ok(())
}

fn all(manager: &MountManager) -> Result<(), String> {
    let db = manager.current().ok_or("no database selected")?;
    let docs = db.fetch_all().map_err(|err| err.to_string())?;
    for doc in &docs {
        println!("{}", document_to_display(doc));
    }
    println!("{} document(s)", docs.len());
    Ok(())
}

fn unmount(manager: &mut MountManager, args: &[&str]) -> Result<(), String> {
    let [name] = args else {
        return Err("usage: unmount <name>".to_string());
    };
    manager.unmount(name).map_err(|err| err.to_string())?;
    println!("unmounted {name}");
    Ok(())
}
