use std::thread;

use glam::DVec3;

use dbsfield_rs::config::SimulationConfig;
use dbsfield_rs::context::SimulationContext;
use dbsfield_rs::models::electrode::{ElectrodeKind, StimulationMode};
use dbsfield_rs::physics::bc::BoundaryMode;

fn context(kind: &str) -> SimulationContext {
    let json = format!(
        r#"{{
            "grid": {{ "dims": [12, 12, 12], "extent_mm": [20.0, 20.0, 20.0] }},
            "tissue": {{ "seed": 9 }},
            "electrode": {{ "kind": "{kind}", "tip": [10.0, 10.0, 6.0], "seed": 3 }},
            "solver": {{ "boundary": "zero_potential" }}
        }}"#
    );
    SimulationContext::new(SimulationConfig::from_json_str(&json).unwrap()).unwrap()
}

#[test]
fn bipolar_verif() {
    let ctx = context("quadripolar");

    println!("Test 1: Default bipolar pair drives +2/-2 mA");
    let solution = ctx.stimulate(StimulationMode::Bipolar, &[0, 2], None, None);
    assert_eq!(solution.electrode.amplitudes, vec![2.0, -2.0]);
    assert_eq!(solution.electrode.active_contacts, vec![0, 2]);

    println!("Test 2: Source voxels carry opposite potentials");
    let grid = *ctx.volume().grid();
    let at = |id: usize| {
        let p = DVec3::from_array(solution.electrode.contacts[id].position);
        let (i, j, k) = grid.locate(p).unwrap();
        solution.potential.get(i, j, k)
    };
    assert!(at(0) * at(2) < 0.0);
    assert_eq!(solution.contact_voltages.len(), 4);

    println!("Test 3: Reversing the pair flips the potential");
    let reversed = ctx.stimulate(
        StimulationMode::Multipolar,
        &[0, 2],
        Some(&[-2.0, 2.0][..]),
        None,
    );
    let scale = solution.potential.max_abs().0;
    for (a, b) in solution.potential.data.iter().zip(&reversed.potential.data) {
        assert!((a + b).abs() <= 1e-6 * scale);
    }
    assert_eq!(ctx.solver().degraded_solves(), 0);
}

#[test]
fn directional_verif() {
    let ctx = context("directional");
    let snapshot = ctx.electrode_snapshot();
    assert_eq!(snapshot.kind, ElectrodeKind::Directional);
    assert_eq!(snapshot.contacts.len(), 8);

    println!("Test 1: Each segment produces its own field");
    let a = ctx.stimulate(StimulationMode::Monopolar, &[4], None, None);
    let b = ctx.stimulate(StimulationMode::Monopolar, &[5], None, None);
    assert!(a.magnitude.max_abs().0 > 0.0);
    assert!(b.magnitude.max_abs().0 > 0.0);
    assert_eq!(a.electrode.amplitudes, vec![2.0]);

    println!("Test 2: Natural boundary override keeps the reference voxel at 0 V");
    let natural = ctx.stimulate(
        StimulationMode::Monopolar,
        &[4],
        None,
        Some(BoundaryMode::Natural),
    );
    assert_eq!(natural.potential.data[0], 0.0);
    assert_ne!(natural.potential, a.potential);
}

#[test]
fn concurrent_verif() {
    let ctx = context("quadripolar");
    let requests: Vec<(usize, f64)> = vec![(0, 1.0), (1, 2.0), (2, 3.0), (3, 4.0)];

    let solutions = thread::scope(|s| {
        let handles: Vec<_> = requests
            .iter()
            .map(|&(contact, amp)| {
                let ctx = &ctx;
                s.spawn(move || {
                    ctx.stimulate(StimulationMode::Monopolar, &[contact], Some(&[amp][..]), None)
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .collect::<Vec<_>>()
    });

    for (&(contact, amp), solution) in requests.iter().zip(&solutions) {
        assert_eq!(solution.electrode.active_contacts, vec![contact]);
        assert_eq!(solution.electrode.amplitudes, vec![amp]);

        let sequential =
            ctx.stimulate(StimulationMode::Monopolar, &[contact], Some(&[amp][..]), None);
        assert_eq!(sequential.potential, solution.potential);
    }
}
