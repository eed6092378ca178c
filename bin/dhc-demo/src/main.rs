use std::process::ExitCode;

use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use dhc_core::prelude::*;
use dhc_learning::{
    prelude::*, sul::MealySimulatorSul, BlackBoxProperty, DeepSulOmegaOracle,
    ForbiddenOutputChecker, LassoEmptinessOracle, MembershipInclusionOracle,
    ModelCheckingProperty, ParallelConfig,
};
use owo_colors::OwoColorize;
use tracing::{debug, info, trace};
use tracing_subscriber::{filter, prelude::*};

mod targets;

type Target = MealyMachine<char, &'static str>;

fn cli() -> clap::Command {
    Command::new("dhc-demo")
        .about("Learns simulated Mealy machines with the DHC algorithm")
        .subcommand_required(true)
        .arg(
            Arg::new("verbosity")
                .short('v')
                .long("verbosity")
                .num_args(0..=1)
                .require_equals(true)
                .value_parser(["info", "debug", "trace"])
                .default_missing_value("info"),
        )
        .arg(
            Arg::new("log-models")
                .long("log-models")
                .action(ArgAction::SetTrue)
                .help("log every hypothesis at debug level"),
        )
        .subcommand(
            Command::new("learn")
                .about("learns a target and checks the result for equivalence")
                .arg(
                    Arg::new("target")
                        .long("target")
                        .value_parser(["toggle", "vending"])
                        .default_value("vending"),
                )
                .arg(
                    Arg::new("parallel")
                        .long("parallel")
                        .action(ArgAction::SetTrue)
                        .help("answer queries with a pool of workers"),
                )
                .arg(
                    Arg::new("instances")
                        .long("instances")
                        .value_parser(value_parser!(usize)),
                )
                .arg(
                    Arg::new("policy")
                        .long("policy")
                        .value_parser(["reuse", "per-batch"]),
                )
                .arg(
                    Arg::new("min-batch-size")
                        .long("min-batch-size")
                        .value_parser(value_parser!(usize)),
                ),
        )
        .subcommand(
            Command::new("bbc")
                .about("black-box checks safety properties of the vending machine while learning it")
                .arg(
                    Arg::new("unfolds")
                        .long("unfolds")
                        .value_parser(value_parser!(usize))
                        .default_value("3"),
                )
                .arg(
                    Arg::new("keep-learning")
                        .long("keep-learning")
                        .action(ArgAction::SetTrue)
                        .help("keep looking for counterexamples once all properties are violated"),
                ),
        )
}

fn setup_logging(matches: &ArgMatches) {
    let level = match matches
        .try_get_one::<String>("verbosity")
        .ok()
        .flatten()
        .map(|m| m.as_str())
    {
        Some("trace") => filter::LevelFilter::TRACE,
        Some("debug") => filter::LevelFilter::DEBUG,
        Some("info") => filter::LevelFilter::INFO,
        _ => filter::LevelFilter::WARN,
    };

    let stderr_log = tracing_subscriber::fmt::layer()
        .pretty()
        .with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(stderr_log.with_filter(level))
        .init();

    trace!("setup {level} logging");
}

fn run_experiment<M>(
    oracle: M,
    target: Target,
    log_models: bool,
) -> Result<(), LearnError>
where
    M: MembershipOracle<Input = char, Output = &'static str>,
{
    let alphabet = target.alphabet().clone();
    let mut experiment = Experiment::new(
        MealyDhc::new(alphabet.clone(), oracle),
        SimulatorEquivalenceOracle::new(target),
        alphabet,
    )
    .with_log_models(log_models)
    .with_profiling(true);

    let learned = experiment.run()?;
    println!("{}", format!("learned {} states", learned.size()).green());
    println!("{learned:?}");
    println!("{}", experiment.rounds().blue());
    println!("{}", experiment.profile_table());
    Ok(())
}

fn learn(matches: &ArgMatches, log_models: bool) -> Result<(), LearnError> {
    let name = matches
        .get_one::<String>("target")
        .map(String::as_str)
        .unwrap_or("vending");
    let target = targets::by_name(name)?;
    debug!("learning {name} with {} states", target.size());
    let sul = MealySimulatorSul::new(target.clone());

    if !matches.get_flag("parallel") {
        return run_experiment(SulOracle::new(sul), target, log_models);
    }

    let mut config = ParallelConfig::from_env();
    if let Some(&instances) = matches.get_one::<usize>("instances") {
        config.num_instances = Some(instances);
    }
    if let Some(policy) = matches.get_one::<String>("policy") {
        config.policy = policy.parse()?;
    }
    if let Some(&size) = matches.get_one::<usize>("min-batch-size") {
        config.min_batch_size = size;
    }
    let oracle = ParallelOracleBuilder::from_factory(move || Ok(SulOracle::new(sul.fork()?)))
        .with_config(config)
        .build()?;
    info!(
        "dispatching batches of at least {} queries to {} workers, policy {:?}",
        oracle.min_batch_size(),
        oracle.num_workers(),
        oracle.policy()
    );
    run_experiment(oracle, target, log_models)
}

fn bbc(matches: &ArgMatches, log_models: bool) -> Result<(), LearnError> {
    let target = targets::vending()?;
    let alphabet = target.alphabet().clone();
    let unfolds = matches.get_one::<usize>("unfolds").copied().unwrap_or(3);

    let property = |name: &str, forbidden: &'static str| -> Result<_, LearnError> {
        Ok(ModelCheckingProperty::new(
            name,
            ForbiddenOutputChecker::<char, &'static str>::new(unfolds)
                .with_property(name, forbidden),
            LassoEmptinessOracle::new(DeepSulOmegaOracle::new(MealySimulatorSul::new(
                target.clone(),
            ))?),
            MembershipInclusionOracle::new(SulOracle::new(MealySimulatorSul::new(
                target.clone(),
            ))),
        ))
    };
    let black_box = CexFirstOracle::new([
        property("never rejects a coin", "reject")?,
        property("never fails", "error")?,
        property("never explodes", "boom")?,
    ]);

    let experiment = Experiment::new(
        MealyDhc::new(
            alphabet.clone(),
            SulOracle::new(MealySimulatorSul::new(target.clone())),
        ),
        SimulatorEquivalenceOracle::new(target),
        alphabet,
    )
    .with_log_models(log_models)
    .with_profiling(true);
    let mut bbc = BbcExperiment::new(experiment, black_box)
        .with_keep_learning(matches.get_flag("keep-learning"));

    let learned = bbc.run()?;
    println!("{}", format!("learned {} states", learned.size()).green());
    println!("{learned:?}");

    for property in bbc.black_box().properties() {
        match property.witness() {
            Some(witness) => println!(
                "{} {} on {}",
                "violated".red(),
                property.property(),
                witness.input().show()
            ),
            None => println!("{} {}", "not disproved".green(), property.property()),
        }
    }
    println!("{}", bbc.experiment().rounds().blue());
    println!("{}", bbc.bbc_rounds().blue());
    println!("{}", bbc.violation_rounds().blue());
    println!("{}", bbc.experiment().profile_table());
    Ok(())
}

pub fn main() -> ExitCode {
    let matches = cli().get_matches();

    setup_logging(&matches);
    let log_models = matches.get_flag("log-models");

    let outcome = match matches.subcommand() {
        Some(("learn", sub_matches)) => learn(sub_matches, log_models),
        Some(("bbc", sub_matches)) => bbc(sub_matches, log_models),
        _ => unreachable!("subcommand is required"),
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {e}", "error:".red());
            ExitCode::FAILURE
        }
    }
}
