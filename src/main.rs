use clap::Parser;

use worm_pimc::{Config, Constants, PimcDriver, PrimitiveAction, System};

#[derive(Parser, Debug)]
#[command(version, about = "Grand-canonical worm-algorithm PIMC sampler", long_about = None)]
struct Args {
    /// YAML run configuration
    #[arg(short, long, default_value = "config.yml")]
    config: String,

    /// Equilibration sweeps before reporting
    #[arg(short, long, default_value_t = 500)]
    equilibrate: usize,

    /// Production sweeps
    #[arg(short, long, default_value_t = 2000)]
    sweeps: usize,

    /// PRNG seed
    #[arg(long, default_value_t = 1973)]
    seed: u64,
}

fn main() {
    let args = Args::parse();

    let config = match Config::load(&args.config) {
        Ok(config) => config,
        Err(problem) => {
            eprintln!("error: {problem}");
            std::process::exit(1);
        }
    };
    let constants = match Constants::new(&config) {
        Ok(constants) => constants,
        Err(problem) => {
            eprintln!("error: {problem}");
            std::process::exit(1);
        }
    };

    let potential = config.potential.build();
    println!("=== Worm-algorithm PIMC ===");
    println!("Temperature T: {:.4}", constants.temperature);
    println!("Chemical potential mu: {:.4}", constants.mu);
    println!("Time slices M: {}", constants.num_time_slices);
    println!("Imaginary time step tau: {:.6}", constants.tau);
    println!("Worm constant C: {:.4}", constants.worm_constant);
    println!("Potential: {}", potential.name());
    println!("Initial particles: {}", constants.initial_num_particles);
    println!();

    let action = Box::new(PrimitiveAction::new(&constants, potential));
    let system = System::new(constants, config.container(), action, args.seed);
    let mut driver = PimcDriver::new(system);

    println!("Equilibrating ({} sweeps)...", args.equilibrate);
    for sweep in 0..args.equilibrate {
        driver.sweep();
        if args.equilibrate >= 10 && sweep % (args.equilibrate / 10) == 0 {
            println!(
                "  sweep {:6}: N = {:4}, diagonal fraction = {:.3}",
                sweep,
                driver.system.path.true_num_particles(),
                driver.diagonal_fraction(),
            );
        }
    }
    println!();

    println!("Sampling ({} sweeps)...", args.sweeps);
    let mut particle_sum = 0.0;
    let mut samples = 0u64;
    for sweep in 0..args.sweeps {
        driver.sweep();
        if driver.system.path.worm.is_config_diagonal {
            particle_sum += driver.system.path.true_num_particles() as f64;
            samples += 1;
        }
        if args.sweeps >= 10 && sweep % (args.sweeps / 10) == 0 {
            println!(
                "  sweep {:6}: N = {:4}, beads = {:6}, diagonal fraction = {:.3}",
                sweep,
                driver.system.path.true_num_particles(),
                driver.system.path.num_beads(),
                driver.diagonal_fraction(),
            );
        }
    }
    println!();

    println!("=== Results ===");
    if samples > 0 {
        let volume = driver.system.path.container.volume;
        let mean_n = particle_sum / samples as f64;
        println!("Mean particle number <N>: {:.4}", mean_n);
        println!("Mean density <N>/V: {:.6}", mean_n / volume);
    }
    println!("Diagonal fraction: {:.4}", driver.diagonal_fraction());
    println!();
    println!("{:<16} {:>10} {:>10} {:>8}", "move", "attempted", "accepted", "ratio");
    for report in driver.acceptance_report() {
        println!(
            "{:<16} {:>10} {:>10} {:>8.4}",
            report.name, report.attempted, report.accepted, report.acceptance_ratio,
        );
    }
}
