//! Contract checks shared by every formula variant.

use std::collections::BTreeMap;

use leveling_core::{
    CustomFormula, ExponentialFormula, Formula, FormulaError, Level, LevelFormula, LevelTable,
    LinearFormula, TableFormula, Xp,
};

fn all_variants() -> Vec<(&'static str, Formula, Level)> {
    let table = LevelTable::new([(1, 0), (2, 100), (3, 250), (5, 700), (10, 3_000)]).unwrap();
    let constants: BTreeMap<String, f64> =
        [("a".to_string(), 0.12), ("b".to_string(), 100.0)].into();

    vec![
        ("linear", LinearFormula::new(100).unwrap().into(), 500),
        (
            "exponential",
            ExponentialFormula::new(100.0, 1.7).unwrap().into(),
            500,
        ),
        ("table", TableFormula::new("levels.csv", table).into(), 10),
        (
            "custom",
            CustomFormula::new("b * exp(a * (level - 1))", constants, 200)
                .unwrap()
                .into(),
            200,
        ),
    ]
}

#[test]
fn level_one_starts_at_zero_xp() {
    for (name, formula, _) in all_variants() {
        assert_eq!(formula.xp_for_level(1).unwrap(), 0, "{name}");
        assert_eq!(formula.level_for_xp(0).unwrap(), 1, "{name}");
    }
}

#[test]
fn floors_never_decrease() {
    for (name, formula, top) in all_variants() {
        let mut previous: Xp = 0;
        for level in 1..=top {
            let floor = formula.xp_for_level(level).unwrap();
            assert!(floor >= previous, "{name}: level {level} dropped below {previous}");
            previous = floor;
        }
    }
}

#[test]
fn inverse_recovers_level_from_floor() {
    for (name, formula, top) in all_variants() {
        for level in 1..=top {
            let floor = formula.xp_for_level(level).unwrap();
            assert_eq!(formula.level_for_xp(floor).unwrap(), level, "{name}: level {level}");
        }
    }
}

#[test]
fn out_of_domain_arguments_are_rejected() {
    for (name, formula, _) in all_variants() {
        assert!(
            matches!(formula.xp_for_level(0), Err(FormulaError::InvalidArgument(_))),
            "{name}"
        );
        assert!(
            matches!(formula.level_for_xp(-1), Err(FormulaError::InvalidArgument(_))),
            "{name}"
        );
    }
}

#[test]
fn reference_values() {
    let exponential = ExponentialFormula::new(100.0, 1.7).unwrap();
    assert_eq!(
        exponential.xp_for_level(10).unwrap(),
        (100.0 * 9f64.powf(1.7)).ceil() as Xp
    );

    let linear = LinearFormula::new(100).unwrap();
    assert_eq!(linear.xp_for_level(5).unwrap(), 400);
    assert_eq!(linear.level_for_xp(399).unwrap(), 4);
    assert_eq!(linear.level_for_xp(400).unwrap(), 5);
}
