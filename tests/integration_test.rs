use std::sync::Arc;

use itertools::{iproduct, Itertools};
use nalgebra::{Matrix3, Vector3};

use xtalsym::auxiliary::geometry::Lattice;
use xtalsym::auxiliary::structure::{BasisSite, DofKind, DofSet, Structure};
use xtalsym::cluster::cluster_specs::ClusterSpecs;
use xtalsym::cluster::orbit::{make_local_orbits, make_prim_periodic_orbits};
use xtalsym::cluster::Cluster;
use xtalsym::configuration::dof_space::DofSpace;
use xtalsym::drivers::dof_space_analysis::dof_space_analysis;
use xtalsym::symmetry::invariance::make_cluster_group;
use xtalsym::symmetry::prim_symmetry::PrimSymmetry;
use xtalsym::symmetry::symmetry_operation::SymOp;

fn cubic_ops() -> Vec<SymOp> {
    (0..3)
        .permutations(3)
        .flat_map(|perm| {
            iproduct!([1.0, -1.0], [1.0, -1.0], [1.0, -1.0]).map(move |(s0, s1, s2)| {
                let signs = [s0, s1, s2];
                let mut mat = Matrix3::zeros();
                for (row, &col) in perm.iter().enumerate() {
                    mat[(row, col)] = signs[row];
                }
                SymOp::new(mat, Vector3::zeros())
            })
        })
        .collect()
}

fn simple_cubic_prim() -> Arc<PrimSymmetry> {
    let lattice = Lattice::new(Matrix3::identity() * 2.0, 1e-5).unwrap();
    let site = BasisSite::new(Vector3::zeros(), &["A", "B"])
        .with_dof(DofSet::standard(DofKind::Displacement).unwrap());
    let structure = Structure::builder()
        .lattice(lattice)
        .basis(vec![site])
        .global_dofs(vec![DofSet::standard(DofKind::Strain).unwrap()])
        .build()
        .unwrap();
    Arc::new(PrimSymmetry::new(structure, cubic_ops()).unwrap())
}

#[test]
fn test_simple_cubic_periodic_and_local_orbits() {
    let prim = simple_cubic_prim();
    let specs = ClusterSpecs::builder()
        .prim(prim.clone())
        .max_length(vec![0.0, 0.0, 2.1, 2.1])
        .build()
        .unwrap();
    let orbits = make_prim_periodic_orbits(&specs).unwrap();
    let sizes = orbits
        .iter()
        .map(|orbit| orbit.first().unwrap().size())
        .collect::<Vec<_>>();
    assert_eq!(sizes, vec![0, 1, 2]);
    assert_eq!(orbits[2].len(), 3);

    let pair = Cluster::from_list(&[[0, 0, 0, 0], [0, 1, 0, 0]]).unwrap();
    let (pair_group, _) = make_cluster_group(
        &pair,
        prim.factor_group(),
        prim.structure().lattice(),
        prim.site_rep(),
    )
    .unwrap();
    assert_eq!(pair_group.order(), 16);

    let local_specs = ClusterSpecs::builder()
        .prim(prim)
        .phenomenal(pair.clone())
        .max_length(vec![0.0, 0.0, 2.1])
        .cutoff_radius(vec![0.0, 2.1, 2.1])
        .build()
        .unwrap();
    let local_orbits = make_local_orbits(&local_specs, &pair).unwrap();
    for orbit in local_orbits.iter() {
        assert_eq!(16 % orbit.len(), 0);
        for cluster in orbit.iter() {
            assert!(pair.sites().iter().all(|site| !cluster.contains(site)));
        }
    }
}

#[test]
fn test_simple_cubic_strain_decomposition() {
    let prim = simple_cubic_prim();
    let dof_space = DofSpace::new(DofKind::Strain, prim, None, None, None).unwrap();
    let (adapted, report) = dof_space_analysis(&dof_space, None, None, false, true).unwrap();
    assert_eq!(adapted.subspace_dim(), 6);
    let dims = report
        .irreps
        .iter()
        .map(|irrep| irrep.dim)
        .collect::<Vec<_>>();
    assert_eq!(dims, vec![1, 2, 3]);
    assert!(report.irreducible_wedges.is_some());
}
