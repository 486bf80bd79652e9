use clap::{App, AppSettings, Arg, ArgMatches, SubCommand};
use num_bigint::BigUint;
use rand::rngs::OsRng;
use std::collections::BTreeMap;
use std::net::TcpListener;
use std::sync::{Arc, Mutex};
use tracing::{error, info, warn};
use veilvote::*;

mod db;
mod tcp;

use tcp::TcpChannel;

fn main() {
    tracing_subscriber::fmt::init();

    let arbiter_key_arg = Arg::with_name("arbiter-key")
        .long("arbiter-key")
        .takes_value(true)
        .multiple(true)
        .number_of_values(1)
        .required(true)
        .help("Arbiter public share as name=path; repeat once per arbiter");

    let matches = App::new("veilvote")
        .version("0.1.0")
        .about("Garbled-circuit SFE and blind-signature e-voting roles")
        .setting(AppSettings::ArgRequiredElseHelp)
        .subcommand(
            SubCommand::with_name("keygen")
                .about("Generate an RSA keypair (registrar or tallyer)")
                .arg(
                    Arg::with_name("secret")
                        .long("secret")
                        .takes_value(true)
                        .required(true)
                        .help("File location to write the PKCS#8 private key"),
                )
                .arg(
                    Arg::with_name("public")
                        .long("public")
                        .takes_value(true)
                        .required(true)
                        .help("File location to write the public key"),
                ),
        )
        .subcommand(
            SubCommand::with_name("voter")
                .about("Voter actions")
                .setting(AppSettings::ArgRequiredElseHelp)
                .subcommand(
                    SubCommand::with_name("register")
                        .about("Encrypt a vote and trade it for a blind signature")
                        .arg(Arg::with_name("address").long("address").takes_value(true).default_value("127.0.0.1"))
                        .arg(Arg::with_name("port").long("port").takes_value(true).required(true))
                        .arg(Arg::with_name("id").long("id").takes_value(true).required(true))
                        .arg(
                            Arg::with_name("vote")
                                .long("vote")
                                .takes_value(true)
                                .required(true)
                                .possible_values(&["0", "1"]),
                        )
                        .arg(Arg::with_name("registrar-key").long("registrar-key").takes_value(true).required(true))
                        .arg(Arg::with_name("tallyer-key").long("tallyer-key").takes_value(true).required(true))
                        .arg(arbiter_key_arg.clone())
                        .arg(
                            Arg::with_name("out")
                                .long("out")
                                .takes_value(true)
                                .required(true)
                                .help("File location to save the registration state"),
                        ),
                )
                .subcommand(
                    SubCommand::with_name("vote")
                        .about("Cast a registered ballot with the tallyer")
                        .arg(Arg::with_name("address").long("address").takes_value(true).default_value("127.0.0.1"))
                        .arg(Arg::with_name("port").long("port").takes_value(true).required(true))
                        .arg(Arg::with_name("registration").long("registration").takes_value(true).required(true))
                        .arg(Arg::with_name("registrar-key").long("registrar-key").takes_value(true).required(true))
                        .arg(Arg::with_name("tallyer-key").long("tallyer-key").takes_value(true).required(true))
                        .arg(arbiter_key_arg.clone()),
                )
                .subcommand(
                    SubCommand::with_name("verify")
                        .about("Re-verify the election and recover the tally")
                        .arg(Arg::with_name("db").long("db").takes_value(true).required(true))
                        .arg(Arg::with_name("registrar-key").long("registrar-key").takes_value(true).required(true))
                        .arg(Arg::with_name("tallyer-key").long("tallyer-key").takes_value(true).required(true))
                        .arg(arbiter_key_arg.clone()),
                ),
        )
        .subcommand(
            SubCommand::with_name("registrar")
                .about("Serve blind-signature registrations")
                .arg(Arg::with_name("port").long("port").takes_value(true).required(true))
                .arg(Arg::with_name("signing-key").long("signing-key").takes_value(true).required(true))
                .arg(Arg::with_name("db").long("db").takes_value(true).required(true)),
        )
        .subcommand(
            SubCommand::with_name("tallyer")
                .about("Accept and counter-sign cast ballots")
                .arg(Arg::with_name("port").long("port").takes_value(true).required(true))
                .arg(Arg::with_name("signing-key").long("signing-key").takes_value(true).required(true))
                .arg(Arg::with_name("registrar-key").long("registrar-key").takes_value(true).required(true))
                .arg(arbiter_key_arg.clone())
                .arg(Arg::with_name("db").long("db").takes_value(true).required(true)),
        )
        .subcommand(
            SubCommand::with_name("arbiter")
                .about("Arbiter actions")
                .setting(AppSettings::ArgRequiredElseHelp)
                .subcommand(
                    SubCommand::with_name("keygen")
                        .about("Generate this arbiter's key share")
                        .arg(Arg::with_name("secret").long("secret").takes_value(true).required(true))
                        .arg(Arg::with_name("public").long("public").takes_value(true).required(true)),
                )
                .subcommand(
                    SubCommand::with_name("adjudicate")
                        .about("Publish this arbiter's partial decryption of the aggregate")
                        .arg(Arg::with_name("id").long("id").takes_value(true).required(true))
                        .arg(Arg::with_name("secret").long("secret").takes_value(true).required(true))
                        .arg(Arg::with_name("public").long("public").takes_value(true).required(true))
                        .arg(Arg::with_name("registrar-key").long("registrar-key").takes_value(true).required(true))
                        .arg(Arg::with_name("tallyer-key").long("tallyer-key").takes_value(true).required(true))
                        .arg(arbiter_key_arg.clone())
                        .arg(Arg::with_name("db").long("db").takes_value(true).required(true)),
                ),
        )
        .subcommand(
            SubCommand::with_name("garbler")
                .about("Garble a circuit and evaluate it with a remote evaluator")
                .arg(Arg::with_name("port").long("port").takes_value(true).required(true))
                .arg(Arg::with_name("circuit").long("circuit").takes_value(true).required(true))
                .arg(Arg::with_name("input").long("input").takes_value(true).required(true)),
        )
        .subcommand(
            SubCommand::with_name("evaluator")
                .about("Evaluate a remote garbler's circuit")
                .arg(Arg::with_name("address").long("address").takes_value(true).default_value("127.0.0.1"))
                .arg(Arg::with_name("port").long("port").takes_value(true).required(true))
                .arg(Arg::with_name("circuit").long("circuit").takes_value(true).required(true))
                .arg(Arg::with_name("input").long("input").takes_value(true).required(true)),
        )
        .get_matches();

    let result = match matches.subcommand() {
        ("keygen", Some(m)) => command_keygen(m),
        ("voter", Some(m)) => match m.subcommand() {
            ("register", Some(m)) => command_voter_register(m),
            ("vote", Some(m)) => command_voter_vote(m),
            ("verify", Some(m)) => command_voter_verify(m),
            _ => unreachable!("ArgRequiredElseHelp"),
        },
        ("registrar", Some(m)) => command_registrar(m),
        ("tallyer", Some(m)) => command_tallyer(m),
        ("arbiter", Some(m)) => match m.subcommand() {
            ("keygen", Some(m)) => command_arbiter_keygen(m),
            ("adjudicate", Some(m)) => command_arbiter_adjudicate(m),
            _ => unreachable!("ArgRequiredElseHelp"),
        },
        ("garbler", Some(m)) => command_garbler(m),
        ("evaluator", Some(m)) => command_evaluator(m),
        _ => unreachable!("ArgRequiredElseHelp"),
    };

    if let Err(err) = result {
        error!("{}", err);
        std::process::exit(1);
    }
}

fn port(matches: &ArgMatches) -> Result<u16, Error> {
    matches
        .value_of("port")
        .unwrap()
        .parse()
        .map_err(|_| Error::Key("invalid port".to_string()))
}

fn parse_bits(text: &str) -> Result<Vec<bool>, Error> {
    text.chars()
        .map(|c| match c {
            '0' => Ok(false),
            '1' => Ok(true),
            _ => Err(Error::Key(format!("invalid input bit '{}'", c))),
        })
        .collect()
}

/// Parse repeated `name=path` arbiter share arguments into an ordered map.
fn arbiter_shares(matches: &ArgMatches) -> Result<BTreeMap<String, BigUint>, Error> {
    let mut shares = BTreeMap::new();
    for entry in matches.values_of("arbiter-key").unwrap() {
        let (name, path) = entry
            .split_once('=')
            .ok_or_else(|| Error::Key(format!("expected name=path, got '{}'", entry)))?;
        shares.insert(name.to_string(), load_integer(path)?);
    }
    Ok(shares)
}

fn election_key(params: &GroupParams, shares: &BTreeMap<String, BigUint>) -> BigUint {
    election_public_key(params, shares.values())
}

fn build_voter(matches: &ArgMatches) -> Result<(Voter, BTreeMap<String, BigUint>), Error> {
    let params = GroupParams::standard();
    let shares = arbiter_shares(matches)?;
    let election_pk = election_key(&params, &shares);
    let registrar_key = load_rsa_public_key(matches.value_of("registrar-key").unwrap())?;
    let tallyer_key = load_rsa_public_key(matches.value_of("tallyer-key").unwrap())?;
    Ok((
        Voter::new(params, election_pk, registrar_key, tallyer_key),
        shares,
    ))
}

fn command_keygen(matches: &ArgMatches) -> Result<(), Error> {
    let (private, public) = rsa_generate_keys(&mut OsRng)?;
    save_rsa_private_key(matches.value_of("secret").unwrap(), &private)?;
    save_rsa_public_key(matches.value_of("public").unwrap(), &public)?;
    info!("RSA keypair written");
    Ok(())
}

fn command_arbiter_keygen(matches: &ArgMatches) -> Result<(), Error> {
    let params = GroupParams::standard();
    let (secret, public) = Arbiter::keygen(&params);
    save_integer(matches.value_of("secret").unwrap(), &secret)?;
    save_integer(matches.value_of("public").unwrap(), &public)?;
    info!("arbiter key share written");
    Ok(())
}

fn command_voter_register(matches: &ArgMatches) -> Result<(), Error> {
    let (voter, _) = build_voter(matches)?;
    let vote = matches.value_of("vote").unwrap() == "1";
    let channel = TcpChannel::connect((matches.value_of("address").unwrap(), port(matches)?))?;

    let registration = voter.register(channel, matches.value_of("id").unwrap(), vote)?;

    let encoded = serde_cbor::to_vec(&registration)?;
    std::fs::write(matches.value_of("out").unwrap(), encoded)?;
    println!(
        "registered; registration state saved to {}",
        matches.value_of("out").unwrap()
    );
    Ok(())
}

fn command_voter_vote(matches: &ArgMatches) -> Result<(), Error> {
    let (voter, _) = build_voter(matches)?;
    let encoded = std::fs::read(matches.value_of("registration").unwrap())?;
    let registration: Registration = serde_cbor::from_slice(&encoded)?;

    let channel = TcpChannel::connect((matches.value_of("address").unwrap(), port(matches)?))?;
    voter.cast(channel, &registration)?;
    println!("ballot cast");
    Ok(())
}

fn command_voter_verify(matches: &ArgMatches) -> Result<(), Error> {
    let (voter, shares) = build_voter(matches)?;
    let store = db::load_store(matches.value_of("db").unwrap())?;

    let (zeros, ones, success) = voter.verify(&store, &shares)?;
    if !success {
        println!("election verification FAILED");
        std::process::exit(1);
    }
    println!("election verified");
    println!("votes for 0: {}", zeros);
    println!("votes for 1: {}", ones);
    Ok(())
}

fn command_registrar(matches: &ArgMatches) -> Result<(), Error> {
    let params = GroupParams::standard();
    let signing_key = load_rsa_private_key(matches.value_of("signing-key").unwrap())?;
    let registrar = Arc::new(Registrar::new(params, signing_key));

    let db_path = matches.value_of("db").unwrap().to_string();
    let store = Arc::new(Mutex::new(db::load_store(&db_path)?));

    serve(port(matches)?, move |channel| {
        let mut store = store.lock().unwrap();
        registrar.handle_registration(channel, &mut *store)?;
        db::save_store(&db_path, &store)
    })
}

fn command_tallyer(matches: &ArgMatches) -> Result<(), Error> {
    let params = GroupParams::standard();
    let shares = arbiter_shares(matches)?;
    let election_pk = election_key(&params, &shares);
    let signing_key = load_rsa_private_key(matches.value_of("signing-key").unwrap())?;
    let registrar_key = load_rsa_public_key(matches.value_of("registrar-key").unwrap())?;
    let tallyer = Arc::new(Tallyer::new(params, election_pk, signing_key, registrar_key));

    let db_path = matches.value_of("db").unwrap().to_string();
    let store = Arc::new(Mutex::new(db::load_store(&db_path)?));

    serve(port(matches)?, move |channel| {
        let mut store = store.lock().unwrap();
        tallyer.handle_cast(channel, &mut *store)?;
        db::save_store(&db_path, &store)
    })
}

/// Accept connections forever, one session thread per connection, in the
/// style of a blocking accept loop.
fn serve<F>(port: u16, handler: F) -> Result<(), Error>
where
    F: Fn(TcpChannel) -> Result<(), Error> + Send + Sync + 'static,
{
    let listener = TcpListener::bind(("0.0.0.0", port))?;
    info!(port, "listening");

    let handler = Arc::new(handler);
    for stream in listener.incoming() {
        let stream = match stream {
            Ok(stream) => stream,
            Err(err) => {
                warn!("accept failed: {}", err);
                continue;
            }
        };
        let handler = Arc::clone(&handler);
        std::thread::spawn(move || {
            if let Err(err) = handler(TcpChannel::new(stream)) {
                warn!("session failed: {}", err);
            }
        });
    }
    Ok(())
}

fn command_arbiter_adjudicate(matches: &ArgMatches) -> Result<(), Error> {
    let params = GroupParams::standard();
    let shares = arbiter_shares(matches)?;
    let election_pk = election_key(&params, &shares);

    let arbiter = Arbiter::new(
        matches.value_of("id").unwrap().to_string(),
        params,
        load_integer(matches.value_of("secret").unwrap())?,
        load_integer(matches.value_of("public").unwrap())?,
        election_pk,
        load_rsa_public_key(matches.value_of("registrar-key").unwrap())?,
        load_rsa_public_key(matches.value_of("tallyer-key").unwrap())?,
    );

    let db_path = matches.value_of("db").unwrap();
    let mut store = db::load_store(db_path)?;
    arbiter.adjudicate(&mut store)?;
    db::save_store(db_path, &store)?;
    println!("partial decryption published");
    Ok(())
}

fn command_garbler(matches: &ArgMatches) -> Result<(), Error> {
    let circuit = Circuit::load(matches.value_of("circuit").unwrap())?;
    let input = parse_bits(matches.value_of("input").unwrap())?;

    let listener = TcpListener::bind(("0.0.0.0", port(matches)?))?;
    info!("waiting for the evaluator");
    let (stream, peer) = listener.accept()?;
    info!(%peer, "evaluator connected");

    let garbler = Garbler::new(circuit, TcpChannel::new(stream), GroupParams::standard());
    let output = garbler.run(&input)?;
    println!("output: {}", output);
    Ok(())
}

fn command_evaluator(matches: &ArgMatches) -> Result<(), Error> {
    let circuit = Circuit::load(matches.value_of("circuit").unwrap())?;
    let input = parse_bits(matches.value_of("input").unwrap())?;

    let channel = TcpChannel::connect((matches.value_of("address").unwrap(), port(matches)?))?;
    let evaluator = Evaluator::new(circuit, channel, GroupParams::standard());
    let output = evaluator.run(&input)?;
    println!("output: {}", output);
    Ok(())
}
