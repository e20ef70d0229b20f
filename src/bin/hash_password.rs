//! Prints an `APP_ADMIN_PASSWORD_HASH` line, single-quoted so it can be pasted
//! into `.env` as is.
//!
//! Usage: `hash-password <password>`

use studio_booking::auth::hash_password;

fn main() {
    let Some(password) = std::env::args().nth(1) else {
        eprintln!("usage: hash-password <password>");
        std::process::exit(2);
    };
    match hash_password(&password) {
        Ok(hash) => println!("APP_ADMIN_PASSWORD_HASH='{hash}'"),
        Err(err) => {
            eprintln!("hash-password: {err}");
            std::process::exit(1);
        }
    }
}
