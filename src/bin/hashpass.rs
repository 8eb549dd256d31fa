//! Operator helper: `hashpass <password> [username] [display name]`.
//!
//! Prints the Argon2 hash, or with a username a ready-to-run
//! `INSERT INTO staff_user` statement.

use zagadogs_admin::auth::hash_password;

fn sql_literal(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

fn main() -> anyhow::Result<()> {
    let mut args = std::env::args().skip(1);
    let Some(password) = args.next() else {
        eprintln!("Usage: hashpass <password> [username] [display name]");
        std::process::exit(2);
    };
    let username = args.next();
    let display_name = args.collect::<Vec<_>>().join(" ");

    let phc = hash_password(&password).map_err(anyhow::Error::msg)?;

    match username {
        Some(username) => {
            let display = if display_name.is_empty() { username.clone() } else { display_name };
            println!(
                "INSERT INTO staff_user (username, display_name, password_hash) VALUES ({}, {}, {});",
                sql_literal(&username),
                sql_literal(&display),
                sql_literal(&phc)
            );
        }
        None => println!("{phc}"),
    }
    Ok(())
}
