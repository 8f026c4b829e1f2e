//! Frame Solver Example - Simply supported beam with dead and live loads

use anyhow::{Context, Result};
use frame_solver::prelude::*;

fn main() -> Result<()> {
    env_logger::init();

    println!("=== Frame Solver Example: Simply Supported Beam ===\n");

    let mut model = FEModel::new();

    // kN, m
    model.add_material("Steel", Material::new(210000.0, 81000.0, 0.3, 7.85e-5))?;

    //   N1 ====================== N2
    //   ^                          o
    //  Pin                      Roller
    let span = 6.0;
    model.add_node("N1", Node::new(0.0, 0.0, 0.0))?;
    model.add_node("N2", Node::new(span, 0.0, 0.0))?;

    let section = Section::new(0.025, 1.2e-4, 1.6e-4, 2.7e-4);
    model.add_member("M1", Member::new("N1", "N2", "Steel", section))?;

    // Torsion is held at the pinned end
    model.add_support("N1", Support::with_restraints(true, true, true, true, false, false))?;
    model.add_support("N2", Support::with_restraints(false, true, true, false, false, false))?;

    // Dead load: 30 kN/m over the full span
    model.add_member_dist_load("M1", DistributedLoad::uniform_downward(30.0, "D"))?;

    // Live load: two 45 kN point loads at the quarter points
    model.add_member_point_load("M1", PointLoad::downward(45.0, 1.5, "L"))?;
    model.add_member_point_load("M1", PointLoad::downward(45.0, 4.5, "L"))?;

    model.add_load_combo(LoadCombination::single("D", "D").with_tag("service"))?;
    model.add_load_combo(
        LoadCombination::new("1.2D+1.6L")
            .with_case("D", 1.2)
            .with_case("L", 1.6)
            .with_tag("strength"),
    )?;

    println!("Running linear analysis...\n");
    let options = AnalysisOptions::linear().with_strict_statics();
    let results = model.analyze(&options).context("analysis failed")?;

    for combo_name in results.combo_names() {
        println!("=== Results for {} ===\n", combo_name);

        println!("Support Reactions:");
        for node_name in ["N1", "N2"] {
            let rxn = results.node_reaction(&combo_name, node_name)?;
            println!("  {}: FX={:.2}kN, FY={:.2}kN, FZ={:.2}kN", node_name, rxn.fx, rxn.fy, rxn.fz);
        }

        let end = results.node_displacement(&combo_name, "N1")?;
        println!("\nRotation at N1: RZ={:.6}rad", end.rz);

        println!("\nMoment diagram (Mz):");
        for (x, mz) in results.member_samples(&combo_name, "M1", Quantity::MomentZ, 7)? {
            println!("  x={:.2}m  Mz={:.2}kN·m", x, mz);
        }

        let (x_min, v_min) = results.member_diagram(&combo_name, "M1")?.min(Quantity::DeflectionY);
        println!("\nMax deflection: {:.3}mm at x={:.2}m", v_min * 1000.0, x_min);

        let summary = results.summary(&combo_name)?;
        println!("\nSummary:");
        println!("  Max reaction: {:.2}kN at {}", summary.max_reaction, summary.max_reaction_node);
        println!("  Max moment: {:.2}kN·m in {}", summary.max_moment, summary.max_moment_member);

        if let Some(check) = results.combo(&combo_name)?.statics.as_ref() {
            println!(
                "  Statics check: passed={} (force error {:.2e}, moment error {:.2e})",
                check.passed,
                check.relative_force_error(),
                check.relative_moment_error()
            );
        }
        println!();
    }

    let envelope = results.envelope("M1", Quantity::MomentZ)?;
    println!(
        "Mz envelope: max {:.2}kN·m ({}), min {:.2}kN·m ({})",
        envelope.max, envelope.max_combo, envelope.min, envelope.min_combo
    );

    println!("\n=== Analysis Complete ===");
    Ok(())
}
