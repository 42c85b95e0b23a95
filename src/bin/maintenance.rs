use std::env;

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use diesel::prelude::*;

use rally::{
    auth::password,
    config::AppConfig,
    db,
    models::{NewRally, NewRallyConfig, NewUser, Role},
    schema::{configuration, rallies, users},
};

const USAGE: &str = "Usage:
  rally-maintenance create-rally <name> <theme> <start YYYY-MM-DD> <end YYYY-MM-DD> [max_photos upload_days voting_days]
  rally-maintenance create-admin <name> <email> <password>
  rally-maintenance promote <email>";

fn main() -> Result<()> {
    dotenv::dotenv().ok();
    rally::init_tracing();

    let args: Vec<String> = env::args().skip(1).collect();
    let Some(command) = args.first() else {
        eprintln!("{USAGE}");
        std::process::exit(1);
    };

    match command.as_str() {
        "create-rally" => create_rally(&args[1..])?,
        "create-admin" => create_admin(&args[1..])?,
        "promote" => promote(&args[1..])?,
        other => {
            eprintln!("Unknown command: {other}\n{USAGE}");
            std::process::exit(1);
        }
    }

    Ok(())
}

fn connect() -> Result<db::PgPool> {
    let config = AppConfig::from_env()?;
    tracing::info!(
        component = "maintenance",
        database_url = %config.redacted_database_url(),
        "loaded backend configuration"
    );
    let pool = db::init_pool(&config.database_url)?;
    db::run_migrations(&pool)?;
    Ok(pool)
}

fn create_rally(args: &[String]) -> Result<()> {
    let [name, theme, start, end, rest @ ..] = args else {
        bail!("create-rally needs <name> <theme> <start> <end>\n{USAGE}");
    };
    let start_date = parse_date(start)?;
    let end_date = parse_date(end)?;
    if end_date < start_date {
        bail!("end date {end_date} is before start date {start_date}");
    }
    let limits = match rest {
        [] => None,
        [max, upload, voting] => Some((
            parse_count("max_photos", max)?,
            parse_count("upload_days", upload)?,
            parse_count("voting_days", voting)?,
        )),
        _ => bail!("configuration needs exactly max_photos upload_days voting_days\n{USAGE}"),
    };

    let pool = connect()?;
    let mut conn = pool.get().context("failed to get database connection")?;

    let id_rally = conn.transaction::<i32, anyhow::Error, _>(|conn| {
        let id_rally = diesel::insert_into(rallies::table)
            .values(&NewRally {
                name: name.clone(),
                theme: theme.clone(),
                start_date,
                end_date,
            })
            .returning(rallies::id_rally)
            .get_result::<i32>(conn)
            .context("failed to insert rally")?;

        if let Some((max_photos_user, upload_deadline, voting_deadline)) = limits {
            diesel::insert_into(configuration::table)
                .values(&NewRallyConfig {
                    id_rally,
                    max_photos_user,
                    upload_deadline,
                    voting_deadline,
                })
                .execute(conn)
                .context("failed to insert rally configuration")?;
        }
        Ok(id_rally)
    })?;

    println!("Created rally {id_rally} ({start_date} to {end_date}).");
    Ok(())
}

fn create_admin(args: &[String]) -> Result<()> {
    let [name, email, plain_password] = args else {
        bail!("create-admin needs <name> <email> <password>\n{USAGE}");
    };

    let pool = connect()?;
    let mut conn = pool.get().context("failed to get database connection")?;

    let id_user = diesel::insert_into(users::table)
        .values(&NewUser {
            name: name.clone(),
            email: email.trim().to_string(),
            password: password::hash_password(plain_password)?,
            rol: Role::Admin.as_str().to_string(),
        })
        .returning(users::id_user)
        .get_result::<i32>(&mut conn)
        .context("failed to insert administrator")?;

    println!("Created administrator {id_user} <{email}>.");
    Ok(())
}

fn promote(args: &[String]) -> Result<()> {
    let [email] = args else {
        bail!("promote needs <email>\n{USAGE}");
    };

    let pool = connect()?;
    let mut conn = pool.get().context("failed to get database connection")?;

    let updated = diesel::update(users::table.filter(users::email.eq(email.trim())))
        .set(users::rol.eq(Role::Admin.as_str()))
        .execute(&mut conn)
        .context("failed to promote user")?;
    if updated == 0 {
        bail!("no user with email {email}");
    }

    println!("{email} is now an administrator.");
    Ok(())
}

fn parse_date(raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .with_context(|| format!("invalid date {raw}, expected YYYY-MM-DD"))
}

fn parse_count(field: &str, raw: &str) -> Result<i32> {
    let value: i32 = raw
        .parse()
        .with_context(|| format!("{field} must be an integer"))?;
    if value < 0 {
        bail!("{field} must not be negative");
    }
    Ok(value)
}
