use approx::assert_relative_eq;
use frame_solver::prelude::*;

fn material() -> Material {
    Material::new(29000.0, 11200.0, 0.3, 2.836e-4)
}

fn continuous_beam(spans: usize, combos: usize) -> FEModel {
    let mut model = FEModel::new();
    model.add_material("Steel", material()).unwrap();
    let section = Section::new(20.0, 100.0, 150.0, 250.0);

    for n in 0..=spans {
        model.add_node(&format!("N{n}"), Node::new(120.0 * n as f64, 0.0, 0.0)).unwrap();
    }
    for m in 0..spans {
        let name = format!("M{m}");
        model
            .add_member(&name, Member::new(&format!("N{m}"), &format!("N{}", m + 1), "Steel", section))
            .unwrap();
        model
            .add_member_dist_load(&name, DistributedLoad::uniform_downward(0.1, "D"))
            .unwrap();
        model
            .add_member_point_load(&name, PointLoad::downward(5.0, 40.0, &format!("L{m}")))
            .unwrap();
    }
    model.add_support("N0", Support::fixed()).unwrap();
    for n in 1..=spans {
        model
            .add_support(&format!("N{n}"), Support::with_restraints(false, true, true, false, false, false))
            .unwrap();
    }

    for c in 0..combos {
        let live = format!("L{}", c % spans);
        model
            .add_load_combo(
                LoadCombination::new(&format!("C{c}"))
                    .with_case("D", 1.2)
                    .with_case(&live, 1.0 + c as f64 * 0.1),
            )
            .unwrap();
    }
    model
}

#[test]
fn single_free_node_is_unstable() {
    let mut model = FEModel::new();
    model.add_node("N1", Node::new(0.0, 0.0, 0.0)).unwrap();

    let err = model.analyze_linear().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Instability);
    assert_eq!(err.unstable_dofs().len(), 6);
    assert!(err.unstable_dofs().iter().all(|dof| dof.node == "N1"));
}

#[test]
fn insufficient_restraints_are_unstable() {
    let mut model = FEModel::new();
    model.add_material("Steel", material()).unwrap();
    model.add_node("N1", Node::new(0.0, 0.0, 0.0)).unwrap();
    model.add_node("N2", Node::new(100.0, 0.0, 0.0)).unwrap();
    model
        .add_member("M1", Member::new("N1", "N2", "Steel", Section::new(10.0, 50.0, 80.0, 40.0)))
        .unwrap();
    // Free to slide along X
    model.add_support("N1", Support::with_restraints(false, true, true, true, false, false)).unwrap();
    model.add_support("N2", Support::with_restraints(false, true, true, false, false, false)).unwrap();
    model.add_node_load("N2", NodeLoad::fy(-1.0, "Case 1")).unwrap();

    let err = model.analyze_linear().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Instability);
    assert!(!err.unstable_dofs().is_empty());
    assert!(err.to_string().contains("DX"));
}

#[test]
fn unconnected_node_is_reported() {
    let mut model = continuous_beam(2, 1);
    model.add_node("Orphan", Node::new(0.0, 50.0, 0.0)).unwrap();

    let err = model.analyze_linear().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Instability);
    assert_eq!(err.unstable_dofs().len(), 6);
    assert!(err.unstable_dofs().iter().all(|dof| dof.node == "Orphan"));
}

#[test]
fn fully_restrained_model_has_no_unknowns() {
    let mut model = FEModel::new();
    model.add_material("Steel", material()).unwrap();
    model.add_node("N1", Node::new(0.0, 0.0, 0.0)).unwrap();
    model.add_node("N2", Node::new(100.0, 0.0, 0.0)).unwrap();
    model
        .add_member("M1", Member::new("N1", "N2", "Steel", Section::new(10.0, 50.0, 80.0, 40.0)))
        .unwrap();
    model.add_support("N1", Support::fixed()).unwrap();
    model.add_support("N2", Support::fixed()).unwrap();
    model
        .add_member_dist_load("M1", DistributedLoad::uniform_downward(0.2, "Case 1"))
        .unwrap();

    let results = model.analyze_linear().unwrap();
    let r1 = results.node_reaction("Combo 1", "N1").unwrap();
    let r2 = results.node_reaction("Combo 1", "N2").unwrap();
    assert_relative_eq!(r1.fy, 10.0, epsilon = 1e-12);
    assert_relative_eq!(r2.fy, 10.0, epsilon = 1e-12);
    assert_relative_eq!(r1.mz, 0.2 * 100.0 * 100.0 / 12.0, epsilon = 1e-9);
    assert_eq!(results.summary("Combo 1").unwrap().free_dofs, 0);
}

#[test]
fn parallel_and_serial_runs_agree() {
    let model = continuous_beam(4, 12);

    let parallel = model.analyze(&AnalysisOptions::linear()).unwrap();
    let serial = model.analyze(&AnalysisOptions::linear().serial()).unwrap();
    assert_eq!(parallel, serial);
    assert_eq!(parallel.combo_names(), model.combo_names());

    let natural = model.analyze(&AnalysisOptions::linear().with_reorder(false)).unwrap();
    for combo in model.combo_names() {
        for n in 0..=4 {
            let a = parallel.node_displacement(&combo, &format!("N{n}")).unwrap();
            let b = natural.node_displacement(&combo, &format!("N{n}")).unwrap();
            assert_relative_eq!(a.rz, b.rz, max_relative = 1e-9, epsilon = 1e-15);
        }
    }
}

#[test]
fn cancellation_keeps_completed_combinations() {
    let model = continuous_beam(3, 6);
    let options = AnalysisOptions::linear().serial();
    let analysis = model.prepare(&options).unwrap();

    let cancel = CancelToken::new();
    let first = analysis.solve_combination(&model.combos()[0]).unwrap();
    cancel.cancel();
    let results = analysis.solve_all(&cancel).unwrap();
    assert!(results.is_cancelled());
    assert!(results.combo_names().is_empty());

    let complete = analysis.solve_all(&CancelToken::new()).unwrap();
    assert!(!complete.is_cancelled());
    assert_eq!(complete.combo_names().len(), 6);
    assert_eq!(complete.combo("C0").unwrap(), &first);
}

#[test]
fn results_go_stale_after_mutation() {
    let mut model = continuous_beam(2, 2);
    let results = model.analyze_linear().unwrap();
    assert!(results.is_current(&model));

    model.add_node_load("N1", NodeLoad::fx(1.0, "D")).unwrap();
    assert!(!results.is_current(&model));
    assert!(results.revision() < model.revision());
}

#[test]
fn json_round_trip_reproduces_results() {
    let model = continuous_beam(3, 3);
    let json = model.to_json().unwrap();
    let restored = FEModel::from_json(&json).unwrap();

    assert_eq!(restored.combo_names(), model.combo_names());
    assert_eq!(restored.load_cases(), model.load_cases());

    let original = model.analyze_linear().unwrap();
    let replayed = restored.analyze_linear().unwrap();
    for combo in model.combo_names() {
        for n in 0..=3 {
            let node = format!("N{n}");
            assert_eq!(
                original.node_displacement(&combo, &node).unwrap(),
                replayed.node_displacement(&combo, &node).unwrap()
            );
        }
        assert_eq!(
            original.member_end_forces(&combo, "M1").unwrap(),
            replayed.member_end_forces(&combo, "M1").unwrap()
        );
    }

    assert_eq!(
        FEModel::from_json("{ not json").unwrap_err().kind(),
        ErrorKind::Serialization
    );
}

#[test]
fn unknown_names_in_results() {
    let model = continuous_beam(2, 2);
    let results = model.analyze_linear().unwrap();

    assert!(matches!(
        results.member_end_forces("C9", "M0"),
        Err(FEAError::LoadCombinationNotFound(_))
    ));
    assert!(matches!(results.member_end_forces("C0", "M7"), Err(FEAError::MemberNotFound(_))));
    assert!(matches!(results.envelope("M7", Quantity::MomentZ), Err(FEAError::MemberNotFound(_))));
}

#[test]
fn mechanism_releases_are_rejected() {
    let mut model = FEModel::new();
    model.add_material("Steel", material()).unwrap();
    model.add_node("N1", Node::new(0.0, 0.0, 0.0)).unwrap();
    model.add_node("N2", Node::new(100.0, 0.0, 0.0)).unwrap();

    let mut releases = MemberReleases::pin_both();
    releases.i_node[3] = true;
    releases.j_node[3] = true;
    let err = model
        .add_member(
            "M1",
            Member::new("N1", "N2", "Steel", Section::new(10.0, 50.0, 80.0, 40.0)).with_releases(releases),
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(model.member("M1").is_none());
}

/// Ground -- soft bar (EA/L = 1) -- N2 -- bar with EA/L = `stiffness` -- N3,
/// pulled at N3 with every DOF but DX restrained
fn axial_chain(stiffness: f64) -> FEModel {
    let mut model = FEModel::new();
    model.add_material("Soft", Material::new(1.0, 1.0, 0.3, 0.0)).unwrap();
    model.add_material("Stiff", Material::new(stiffness, stiffness, 0.3, 0.0)).unwrap();
    model.add_node("N1", Node::new(0.0, 0.0, 0.0)).unwrap();
    model.add_node("N2", Node::new(1.0, 0.0, 0.0)).unwrap();
    model.add_node("N3", Node::new(2.0, 0.0, 0.0)).unwrap();

    let section = Section::new(1.0, 1.0, 1.0, 1.0);
    model.add_member("M1", Member::new("N1", "N2", "Soft", section)).unwrap();
    model.add_member("M2", Member::new("N2", "N3", "Stiff", section)).unwrap();

    let slide = Support::with_restraints(false, true, true, true, true, true);
    model.add_support("N1", Support::fixed()).unwrap();
    model.add_support("N2", slide).unwrap();
    model.add_support("N3", slide).unwrap();
    model.add_node_load("N3", NodeLoad::fx(1.0, "Case 1")).unwrap();
    model
}

#[test]
fn stiffness_contrast_is_numerical_not_unstable() {
    let model = axial_chain(1e12);

    let err = model.analyze_linear().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Numerical);
    assert!(err.unstable_dofs().is_empty());
    assert!(err.to_string().contains("ill-conditioned"));

    // Accepting the conditioning gives the series-spring answer 1 + 1/k
    let options = AnalysisOptions::linear().with_condition_tolerance(1e13);
    let results = model.analyze(&options).unwrap();
    let tip = results.node_displacement("Combo 1", "N3").unwrap();
    assert_relative_eq!(tip.dx, 1.0 + 1e-12, max_relative = 1e-3);

    // A moderate contrast solves with the default options
    let results = axial_chain(1e6).analyze_linear().unwrap();
    let tip = results.node_displacement("Combo 1", "N3").unwrap();
    assert_relative_eq!(tip.dx, 1.0 + 1e-6, max_relative = 1e-9);
}

/// Three inclined legs meeting at an off-centre apex, loaded in several directions
fn loaded_tripod() -> FEModel {
    let mut model = FEModel::new();
    model.add_material("Steel", material()).unwrap();
    let section = Section::new(20.0, 100.0, 150.0, 250.0);

    model.add_node("A", Node::new(0.0, 0.0, 0.0)).unwrap();
    model.add_node("B", Node::new(153.7, 0.0, 41.3)).unwrap();
    model.add_node("C", Node::new(61.9, 0.0, -117.1)).unwrap();
    model.add_node("T", Node::new(71.3, 143.9, -13.7)).unwrap();
    for (name, base) in [("AT", "A"), ("BT", "B"), ("CT", "C")] {
        model.add_member(name, Member::new(base, "T", "Steel", section)).unwrap();
        model.add_support(base, Support::fixed()).unwrap();
    }

    model.add_node_load("T", NodeLoad::fx(12.3, "W")).unwrap();
    model.add_node_load("T", NodeLoad::fz(-7.1, "W")).unwrap();
    model
        .add_member_point_load("BT", PointLoad::downward(3.3, 47.9, "D"))
        .unwrap();
    model
        .add_member_dist_load("AT", DistributedLoad::uniform_downward(0.07, "D"))
        .unwrap();

    model
        .add_load_combo(LoadCombination::new("1.2D+W").with_case("D", 1.2).with_case("W", 1.0))
        .unwrap();
    model.add_load_combo(LoadCombination::single("D", "D")).unwrap();
    model
}

#[test]
fn strict_statics_escalates_failures() {
    let model = loaded_tripod();

    // Round-off alone leaves a nonzero residual
    let strict = AnalysisOptions::linear().with_strict_statics().with_statics_tolerance(0.0);
    let err = model.analyze(&strict).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::StaticsCheck);
    match err {
        FEAError::StaticsCheckFailed(failures) => {
            assert!(!failures.is_empty());
            assert!(failures.iter().all(|check| !check.passed));
        }
        other => panic!("unexpected error: {other}"),
    }

    let passing = model.analyze(&AnalysisOptions::linear().with_strict_statics()).unwrap();
    assert_eq!(passing.statics_checks().count(), 2);
    assert!(passing.statics_failures().is_empty());
}

#[test]
fn lenient_statics_records_failures() {
    let model = loaded_tripod();

    let lenient = AnalysisOptions::linear().with_statics_check().with_statics_tolerance(0.0);
    let results = model.analyze(&lenient).unwrap();
    assert_eq!(results.combo_names().len(), 2);
    assert_eq!(results.statics_checks().count(), 2);

    let failures = results.statics_failures();
    assert!(!failures.is_empty());
    for check in failures {
        assert!(model.combo_names().contains(&check.combo));
        assert_eq!(check.tolerance, 0.0);
    }
}
