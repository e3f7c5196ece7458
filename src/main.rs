use std::env;
use std::fs;
use std::path::Path;
use std::process;

use dbsfield_rs::config::SimulationConfig;
use dbsfield_rs::context::{FieldSolution, SimulationContext};
use dbsfield_rs::models::electrode::StimulationMode;
use dbsfield_rs::numerics::timing;
use dbsfield_rs::processing::csv_writer;
use dbsfield_rs::processing::export::{self, SimulationPayload};
use dbsfield_rs::processing::summary::SimulationSummary;

const OUT_DIR: &str = "output/main";

fn main() {
    env_logger::init();

    let config = match env::args().nth(1) {
        Some(path) => SimulationConfig::from_path(&path).unwrap_or_else(|e| {
            eprintln!("Failed to load {}: {}", path, e);
            process::exit(1);
        }),
        None => SimulationConfig::default(),
    };

    fs::create_dir_all(OUT_DIR).expect("Failed to create output directory");
    config
        .write_to_dir(Path::new(OUT_DIR))
        .expect("Failed to write config");

    timing::reset_timing();
    let ctx = SimulationContext::new(config).unwrap_or_else(|e| {
        eprintln!("Setup failed: {}", e);
        process::exit(1);
    });

    println!("Running monopolar stimulation on contact 0...");
    let solution = ctx.stimulate(StimulationMode::Monopolar, &[0], Some(&[2.0][..]), None);
    println!("Solve finished.\n");

    save_profiles(&solution);
    save_payload(&ctx, &solution);

    let summary = SimulationSummary::from_solution(&ctx, &solution);
    summary
        .write_to_file(format!("{OUT_DIR}/simulation_summary.txt"))
        .expect("Failed to write summary");
    summary.print_to_console();
    timing::current_timing().print_summary();

    println!("Summary saved to {OUT_DIR}/simulation_summary.txt");
}

fn save_profiles(solution: &FieldSolution) {
    let (_, peak) = solution.potential.max_abs();
    for (axis, name) in ["x", "y", "z"].iter().enumerate() {
        let path = format!("{OUT_DIR}/profile_{name}.csv");
        csv_writer::write_axis_profile(
            &path,
            &solution.potential,
            &solution.magnitude,
            axis,
            peak,
        )
        .expect("Failed to write profile");
        println!("Profile through peak saved to {path}");
    }

    let volts = &solution.contact_voltages;
    let ids: Vec<f64> = (0..volts.len()).map(|i| i as f64).collect();
    csv_writer::write_xy(
        format!("{OUT_DIR}/contact_voltages.csv"),
        "contact",
        "potential_v",
        &ids,
        volts,
    )
    .expect("Failed to write contact voltages");
    println!("Contact voltages saved to {OUT_DIR}/contact_voltages.csv");
    println!();
}

fn save_payload(ctx: &SimulationContext, solution: &FieldSolution) {
    let payload = SimulationPayload::new(ctx.volume(), solution);
    export::write_json(format!("{OUT_DIR}/simulation.json"), &payload)
        .expect("Failed to write JSON payload");
    println!("Visualisation payload saved to {OUT_DIR}/simulation.json");
}
