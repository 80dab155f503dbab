//! Single-database interactive shell.

use crate::commands::{document_to_display, parse_document, parse_probe_value};
use blazedb_core::{Database, DocumentId, Query};
use std::io::{self, BufRead, Write};
use std::path::Path;

const HELP: &str = "\
commands:
  insert <json-object>          insert a document, prints its id
  get <id>                      fetch a document by id
  all                           list all documents
  find <field> <value>          indexed lookup (value is JSON or bare text)
  query <field> <value>         full-scan equality query
  index <field> [field ...]     create a (compound) index
  delete <id>                   hard-delete a document
  soft-delete <id>              mark a document deleted
  purge                         hard-delete every soft-deleted document
  stats                         page-file statistics
  integrity                     run the integrity reporter
  help                          this text
  exit                          leave the shell";

/// Runs the interactive shell against one database.
pub fn run(db_path: &Path, password: &str, project: &str) -> Result<(), Box<dyn std::error::Error>> {
    let db = Database::open(db_path, password, project)?;
    println!("opened {} (project {project:?})", db_path.display());
    println!("type 'help' for commands");

    let stdin = io::stdin();
    loop {
        print!("blazedb> ");
        io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let (command, rest) = match line.split_once(' ') {
            Some((command, rest)) => (command, rest.trim()),
            None => (line, ""),
        };

        let outcome = match command {
            "exit" | "quit" => break,
            "help" => {
                println!("{HELP}");
                Ok(())
            }
            "insert" => insert(&db, rest),
            "get" => get(&db, rest),
            "all" => all(&db),
            "find" => find(&db, rest),
            "query" => query(&db, rest),
            "index" => index(&db, rest),
            "delete" => delete(&db, rest, false),
            "soft-delete" => delete(&db, rest, true),
            "purge" => purge(&db),
            "stats" => stats(&db),
            "integrity" => integrity(&db),
            other => Err(format!("unknown command {other:?}; try 'help'")),
        };

        if let Err(message) = outcome {
            println!("error: {message}");
        }
    }

    db.flush()?;
    Ok(())
}

fn insert(db: &Database, rest: &str) -> Result<(), String> {
    let doc = parse_document(rest)?;
    let id = db.insert(doc).map_err(|err| err.to_string())?;
    println!("{id}");
    Ok(())
}

fn parse_id(rest: &str) -> Result<DocumentId, String> {
    DocumentId::parse(rest.trim()).ok_or_else(|| format!("not a valid id: {rest:?}"))
}

fn get(db: &Database, rest: &str) -> Result<(), String> {
    let id = parse_id(rest)?;
    match db.fetch(id).map_err(|err| err.to_string())? {
        Some(doc) => println!("{}", document_to_display(&doc)),
        None => println!("not found"),
    }
    Ok(())
}

fn all(db: &Database) -> Result<(), String> {
    let docs = db.fetch_all().map_err(|err| err.to_string())?;
    for doc in &docs {
        println!("{}", document_to_display(doc));
    }
    println!("{} document(s)", docs.len());
    Ok(())
}

fn find(db: &Database, rest: &str) -> Result<(), String> {
    let (field, raw) = rest
        .split_once(' ')
        .ok_or("usage: find <field> <value>")?;
    let value = parse_probe_value(raw.trim())?;
    let docs = db
        .fetch_by_indexed_field(field, &value)
        .map_err(|err| err.to_string())?;
    for doc in &docs {
        println!("{}", document_to_display(doc));
    }
    println!("{} document(s)", docs.len());
    Ok(())
}

fn query(db: &Database, rest: &str) -> Result<(), String> {
    let (field, raw) = rest
        .split_once(' ')
        .ok_or("usage: query <field> <value>")?;
    let value = parse_probe_value(raw.trim())?;
    let docs = db
        .run_query(&Query::new().eq(field, value))
        .map_err(|err| err.to_string())?;
    for doc in &docs {
        println!("{}", document_to_display(doc));
    }
    println!("{} document(s)", docs.len());
    Ok(())
}

fn index(db: &Database, rest: &str) -> Result<(), String> {
    let fields: Vec<&str> = rest.split_whitespace().collect();
    if fields.is_empty() {
        return Err("usage: index <field> [field ...]".to_string());
    }
    db.create_index(&fields).map_err(|err| err.to_string())?;
    println!("index {:?} ready", fields.join("+"));
    Ok(())
}

fn delete(db: &Database, rest: &str, soft: bool) -> Result<(), String> {
    let id = parse_id(rest)?;
    if soft {
        db.soft_delete(id).map_err(|err| err.to_string())?;
        println!("soft-deleted {id}");
    } else {
        db.delete(id).map_err(|err| err.to_string())?;
        println!("deleted {id}");
    }
    Ok(())
}

fn purge(db: &Database) -> Result<(), String> {
    let count = db.purge().map_err(|err| err.to_string())?;
    println!("purged {count} document(s)");
    Ok(())
}

fn stats(db: &Database) -> Result<(), String> {
    let stats = db.page_stats().map_err(|err| err.to_string())?;
    println!(
        "pages: {}, orphaned: {}, bytes: {}",
        stats.total_pages, stats.orphaned_pages, stats.file_bytes
    );
    let ops = db.counters();
    println!(
        "ops: {} inserts, {} fetches, {} updates, {} deletes, {} scans, {} index lookups",
        ops.inserts, ops.fetches, ops.updates, ops.deletes, ops.scans, ops.index_lookups
    );
    Ok(())
}

fn integrity(db: &Database) -> Result<(), String> {
    let report = db.check_integrity(false).map_err(|err| err.to_string())?;
    if report.is_clean() {
        println!("integrity: clean");
    } else {
        for issue in &report.issues {
            println!("  {}: {}", issue.severity, issue.message);
        }
        println!(
            "integrity: {} error(s), {} warning(s)",
            report.error_count(),
            report.warning_count()
        );
    }
    Ok(())
}
