use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use crate::context::{FieldSolution, SimulationContext};
use crate::discretization::volume::ClassStats;
use crate::models::electrode::{ElectrodeKind, StimulationMode};
use crate::numerics::solver::LinearBackend;
use crate::physics::bc::BoundaryMode;

pub struct SimulationSummary {
    // Grid info
    pub dims: [usize; 3],
    pub extent_mm: [f64; 3],
    pub spacing_mm: [f64; 3],
    pub tissue: Vec<ClassStats>,
    pub operator_nnz: usize,

    // Electrode info
    pub kind: ElectrodeKind,
    pub mode: StimulationMode,
    pub active_contacts: Vec<usize>,
    pub amplitudes_ma: Vec<f64>,
    pub contact_voltages: Vec<f64>,

    // Solver info
    pub boundary: BoundaryMode,
    pub backend: LinearBackend,
    pub degraded_solves: usize,

    // Field results
    pub peak_potential: f64,
    pub peak_potential_at: (usize, usize, usize),
    pub peak_field: f64,
    pub peak_field_at: (usize, usize, usize),
    pub mean_field: f64,
}

impl SimulationSummary {
    pub fn from_solution(ctx: &SimulationContext, solution: &FieldSolution) -> Self {
        let grid = *ctx.volume().grid();
        let solver = &ctx.config().solver;
        let (peak_potential, peak_potential_at) = solution.potential.max_abs();
        let (peak_field, peak_field_at) = solution.magnitude.max_abs();
        let mean_field =
            solution.magnitude.data.iter().sum::<f64>() / solution.magnitude.data.len() as f64;

        Self {
            dims: grid.dims,
            extent_mm: grid.extent,
            spacing_mm: grid.spacing,
            tissue: ctx.volume().class_statistics(),
            operator_nnz: ctx.solver().operator().nnz(),
            kind: solution.electrode.kind,
            mode: solution.electrode.mode,
            active_contacts: solution.electrode.active_contacts.clone(),
            amplitudes_ma: solution.electrode.amplitudes.clone(),
            contact_voltages: solution.contact_voltages.clone(),
            boundary: solver.boundary,
            backend: solver.backend.resolve(grid.n_voxels()),
            degraded_solves: ctx.solver().degraded_solves(),
            peak_potential,
            peak_potential_at,
            peak_field,
            peak_field_at,
            mean_field,
        }
    }

    pub fn write_to_file<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let mut file = File::create(path)?;

        writeln!(file, "{}", "=".repeat(60))?;
        writeln!(file, "DBS FIELD SIMULATION SUMMARY")?;
        writeln!(file, "{}", "=".repeat(60))?;
        writeln!(file)?;

        writeln!(file, "GRID")?;
        writeln!(file, "{}", "-".repeat(60))?;
        writeln!(file, "Voxels:              {:?}", self.dims)?;
        writeln!(file, "Extent:              {:?} mm", self.extent_mm)?;
        writeln!(
            file,
            "Spacing:             [{:.4}, {:.4}, {:.4}] mm",
            self.spacing_mm[0], self.spacing_mm[1], self.spacing_mm[2]
        )?;
        writeln!(file, "Operator non-zeros:  {}", self.operator_nnz)?;
        writeln!(file)?;

        writeln!(file, "TISSUE")?;
        writeln!(file, "{}", "-".repeat(60))?;
        for stats in &self.tissue {
            writeln!(
                file,
                "{:<20} {:>8} voxels, mean sigma {:.4} S/m",
                format!("{:?}:", stats.class),
                stats.voxels,
                stats.mean_conductivity
            )?;
        }
        writeln!(file)?;

        writeln!(file, "ELECTRODE")?;
        writeln!(file, "{}", "-".repeat(60))?;
        writeln!(file, "Kind:                {:?}", self.kind)?;
        writeln!(file, "Mode:                {:?}", self.mode)?;
        writeln!(file, "Active contacts:     {:?}", self.active_contacts)?;
        writeln!(file, "Amplitudes:          {:?} mA", self.amplitudes_ma)?;
        for (id, v) in self.contact_voltages.iter().enumerate() {
            writeln!(file, "  contact {:<2} V = {:.6e} V", id, v)?;
        }
        writeln!(file)?;

        writeln!(file, "SOLVER")?;
        writeln!(file, "{}", "-".repeat(60))?;
        writeln!(file, "Boundary:            {:?}", self.boundary)?;
        writeln!(file, "Backend:             {:?}", self.backend)?;
        writeln!(file, "Degraded solves:     {}", self.degraded_solves)?;
        writeln!(file)?;

        writeln!(file, "FIELD")?;
        writeln!(file, "{}", "-".repeat(60))?;
        writeln!(
            file,
            "Peak |V|:            {:.6e} V at {:?}",
            self.peak_potential, self.peak_potential_at
        )?;
        writeln!(
            file,
            "Peak |E|:            {:.6e} V/m at {:?}",
            self.peak_field, self.peak_field_at
        )?;
        writeln!(file, "Mean |E|:            {:.6e} V/m", self.mean_field)?;
        writeln!(file)?;

        writeln!(file, "{}", "=".repeat(60))?;

        Ok(())
    }

    pub fn print_to_console(&self) {
        println!("\n{}", "=".repeat(60));
        println!("SIMULATION SUMMARY");
        println!("{}", "=".repeat(60));
        println!(
            "Grid:          {:?} voxels over {:?} mm",
            self.dims, self.extent_mm
        );
        println!(
            "Electrode:     {:?}, {:?} on {:?} at {:?} mA",
            self.kind, self.mode, self.active_contacts, self.amplitudes_ma
        );
        println!("Solver:        {:?} / {:?}", self.boundary, self.backend);
        println!("Peak |V|:      {:.3e} V", self.peak_potential);
        println!("Peak |E|:      {:.3e} V/m", self.peak_field);
        if self.degraded_solves > 0 {
            println!("Degraded:      {} solve(s)", self.degraded_solves);
        }
        println!("{}\n", "=".repeat(60));
    }
}
