use anyhow::{bail, Context, Result};
use std::env;
use std::path::Path;

use coin_pot::{
    add_coins, create_pot, get_pot, init_logging, load_deposit_csv, open_database, remove_coins,
    AddCoinsRequest, Config, RemoveCoinsRequest,
};

const USAGE: &str = "usage: coin-pot <command>

commands:
  init                        create the database schema
  create-pot <name>           create an empty pot
  deposit <pot_id> <csv>      add coins from a kind,count CSV
  withdraw <pot_id> <count>   remove coins at random, weighted by share
  show <pot_id>               print a pot's contents

environment:
  COIN_POT_DB   database file (default coin_pot.db)
  RUST_LOG      log filter (default info)";

fn main() -> Result<()> {
    let config = Config::from_env();
    init_logging(&config);

    let args: Vec<String> = env::args().skip(1).collect();
    let command = args.first().map(String::as_str).unwrap_or("help");

    match command {
        "init" => run_init(&config),
        "create-pot" => run_create_pot(&config, &args[1..]),
        "deposit" => run_deposit(&config, &args[1..]),
        "withdraw" => run_withdraw(&config, &args[1..]),
        "show" => run_show(&config, &args[1..]),
        "help" | "--help" | "-h" => {
            println!("{}", USAGE);
            Ok(())
        }
        other => {
            eprintln!("❌ Unknown command: {}\n", other);
            eprintln!("{}", USAGE);
            std::process::exit(2);
        }
    }
}

fn arg<'a>(args: &'a [String], idx: usize, name: &str) -> Result<&'a str> {
    match args.get(idx) {
        Some(value) => Ok(value.as_str()),
        None => bail!("missing <{}>\n\n{}", name, USAGE),
    }
}

fn parse_pot_id(raw: &str) -> Result<i64> {
    raw.parse()
        .with_context(|| format!("pot_id must be an integer, got {:?}", raw))
}

fn run_init(config: &Config) -> Result<()> {
    open_database(&config.db_path)?;
    println!("✓ Database ready at {}", config.db_path.display());
    Ok(())
}

fn run_create_pot(config: &Config, args: &[String]) -> Result<()> {
    let name = args.join(" ");
    if name.trim().is_empty() {
        bail!("missing <name>\n\n{}", USAGE);
    }

    let mut conn = open_database(&config.db_path)?;
    let pot = create_pot(&mut conn, &name)?;
    println!("✓ Created pot {} ({})", pot.id, pot.name);
    Ok(())
}

fn run_deposit(config: &Config, args: &[String]) -> Result<()> {
    let pot_id = parse_pot_id(arg(args, 0, "pot_id")?)?;
    let csv_path = Path::new(arg(args, 1, "csv")?);

    println!("📂 Loading deposit batch from {}...", csv_path.display());
    let coins = load_deposit_csv(csv_path)?;

    let mut conn = open_database(&config.db_path)?;
    let added = add_coins(&mut conn, &AddCoinsRequest { pot_id, coins })?;

    println!("✓ Deposited {} coins into pot {}", added.total(), pot_id);
    for coin in &added.coins {
        println!("   {:<8} {:>6}", coin.kind, coin.count);
    }
    Ok(())
}

fn run_withdraw(config: &Config, args: &[String]) -> Result<()> {
    let pot_id = parse_pot_id(arg(args, 0, "pot_id")?)?;
    let raw_count = arg(args, 1, "count")?;
    let count: u32 = raw_count
        .parse()
        .with_context(|| format!("count must be a non-negative integer, got {:?}", raw_count))?;

    let mut conn = open_database(&config.db_path)?;
    let removed = remove_coins(
        &mut conn,
        &RemoveCoinsRequest { pot_id, count },
        &mut rand::thread_rng(),
    )?;

    println!("✓ Withdrew {} coins from pot {}", removed.total(), pot_id);
    for coin in &removed.coins {
        println!("   {:<8} {:>6}", coin.kind, coin.count);
    }
    Ok(())
}

fn run_show(config: &Config, args: &[String]) -> Result<()> {
    let pot_id = parse_pot_id(arg(args, 0, "pot_id")?)?;

    let conn = open_database(&config.db_path)?;
    let contents = get_pot(&conn, pot_id)?;

    println!("🪙  Pot {} - {}", contents.pot.id, contents.pot.name);
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    if contents.coins.is_empty() {
        println!("   (empty)");
    }
    for coin in &contents.coins {
        println!("   {:<8} {:>6}", coin.kind, coin.count);
    }
    println!("   {:<8} {:>6}", "TOTAL", contents.total);
    Ok(())
}
