use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use dbsfield_rs::discretization::volume::ConductivityVolume;
use dbsfield_rs::field::analyzer::derive_field;
use dbsfield_rs::field::solver::{FieldSolver, SolveOptions};
use dbsfield_rs::models::electrode::CurrentSource;
use dbsfield_rs::numerics::solver::LinearBackend;
use dbsfield_rs::physics::bc::BoundaryMode;
use dbsfield_rs::physics::operator::assemble_conductance;
use glam::DVec3;

fn grid_sizes() -> Vec<usize> {
    vec![10, 20, 30]
}

fn dense_sizes() -> Vec<usize> {
    vec![6, 8]
}

fn volume(n: usize) -> ConductivityVolume {
    ConductivityVolume::build([n, n, n], [20.0, 20.0, 20.0], 0).unwrap()
}

fn centre_source() -> Vec<CurrentSource> {
    vec![CurrentSource::new(DVec3::splat(10.0), 1.0)]
}

fn bench_volume_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("volume_build");
    for &size in &grid_sizes() {
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &n| {
            b.iter(|| std::hint::black_box(volume(n)));
        });
    }
    group.finish();
}

fn bench_assembly(c: &mut Criterion) {
    let mut group = c.benchmark_group("operator_assembly");
    for &size in &grid_sizes() {
        let volume = volume(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &_| {
            b.iter(|| {
                let op = assemble_conductance(std::hint::black_box(&volume));
                std::hint::black_box(op.nnz());
            });
        });
    }
    group.finish();
}

fn bench_krylov_solve(c: &mut Criterion) {
    let mut group = c.benchmark_group("krylov_solve");
    group.sample_size(10);
    let sources = centre_source();
    for &size in &grid_sizes() {
        let solver = FieldSolver::build(&volume(size));
        for boundary in [BoundaryMode::ZeroPotential, BoundaryMode::Natural] {
            let options = SolveOptions::with_boundary(boundary).backend(LinearBackend::Krylov);
            group.bench_with_input(
                BenchmarkId::new(format!("{:?}", boundary), size),
                &size,
                |b, &_| {
                    b.iter(|| std::hint::black_box(solver.solve(&sources, &options)));
                },
            );
        }
    }
    group.finish();
}

fn bench_dense_solve(c: &mut Criterion) {
    let mut group = c.benchmark_group("dense_solve");
    group.sample_size(10);
    let sources = centre_source();
    for &size in &dense_sizes() {
        let solver = FieldSolver::build(&volume(size));
        let options = SolveOptions::with_boundary(BoundaryMode::ZeroPotential)
            .backend(LinearBackend::DenseLu);
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &_| {
            b.iter(|| std::hint::black_box(solver.solve(&sources, &options)));
        });
    }
    group.finish();
}

fn bench_derive_field(c: &mut Criterion) {
    let mut group = c.benchmark_group("derive_field");
    for &size in &grid_sizes() {
        let solver = FieldSolver::build(&volume(size));
        let potential = solver.solve(
            &centre_source(),
            &SolveOptions::with_boundary(BoundaryMode::ZeroPotential),
        );
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &_| {
            b.iter(|| std::hint::black_box(derive_field(&potential)));
        });
    }
    group.finish();
}

fn bench_batch_solve(c: &mut Criterion) {
    let mut group = c.benchmark_group("batch_solve");
    group.sample_size(10);
    let solver = FieldSolver::build(&volume(20));
    let options = SolveOptions::with_boundary(BoundaryMode::ZeroPotential);
    let stimuli: Vec<Vec<CurrentSource>> = (0..8)
        .map(|i| vec![CurrentSource::new(DVec3::new(10.0, 10.0, 6.0 + i as f64), 1.0)])
        .collect();
    group.bench_function("8x20", |b| {
        b.iter(|| std::hint::black_box(solver.solve_batch(&stimuli, &options)));
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_volume_build,
    bench_assembly,
    bench_krylov_solve,
    bench_dense_solve,
    bench_derive_field,
    bench_batch_solve
);
criterion_main!(benches);
