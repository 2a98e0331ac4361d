use super::*;

#[test]
fn test_defaults_are_valid() {
    let cfg = Config::default();
    cfg.validate().unwrap();
    assert_eq!(cfg.map.width, 696);
    assert_eq!(cfg.map.height, 509);
    assert_eq!(cfg.smoother.gap_policy, GapMode::Drop);
    assert_eq!(cfg.estimator.weight, WeightModel::Power { scale_db: 10.0 });
}

#[test]
fn test_partial_toml_fills_defaults() {
    let toml_str = r#"
        [smoother]
        alpha = 0.5
        gap_policy = "carry_forward"

        [estimator.weight]
        model = "linear"
        floor_dbm = -130.0
    "#;
    let cfg: Config = toml::from_str(toml_str).unwrap();
    cfg.validate().unwrap();
    assert_eq!(cfg.smoother.alpha, 0.5);
    assert_eq!(cfg.smoother.gap_policy, GapMode::CarryForward);
    assert_eq!(cfg.smoother.max_fill_slots, 6);
    assert_eq!(cfg.estimator.weight, WeightModel::Linear { floor_dbm: -130.0 });
    assert_eq!(cfg.heatmap.cell_size, 1);
    assert_eq!(cfg.footfall.log_level, "info");
}

#[test]
fn test_path_loss_defaults_when_fields_missing() {
    let toml_str = r#"
        [estimator.weight]
        model = "path_loss"
    "#;
    let cfg: Config = toml::from_str(toml_str).unwrap();
    assert_eq!(
        cfg.estimator.weight,
        WeightModel::PathLoss {
            rssi_at_1m: -45.0,
            path_loss_exponent: 2.5
        }
    );
}

#[test]
fn test_validate_rejects_alpha_outside_unit_interval() {
    for alpha in [0.0, -0.1, 1.5, f64::NAN] {
        let mut cfg = Config::default();
        cfg.smoother.alpha = alpha;
        assert!(cfg.validate().is_err(), "alpha {alpha} should be rejected");
    }
    let mut cfg = Config::default();
    cfg.smoother.alpha = 1.0;
    assert!(cfg.validate().is_ok());
}

#[test]
fn test_validate_rejects_zero_cell_and_bad_domain() {
    let mut cfg = Config::default();
    cfg.heatmap.cell_size = 0;
    assert!(cfg.validate().is_err());

    let mut cfg = Config::default();
    cfg.estimator.rssi_max = 5.0;
    assert!(cfg.validate().is_err());

    let mut cfg = Config::default();
    cfg.estimator.weight = WeightModel::Linear { floor_dbm: -60.0 };
    assert!(
        cfg.validate().is_err(),
        "linear floor above rssi_min would go negative"
    );
}

#[test]
fn test_accepts_rssi_domain() {
    let est = EstimatorConfig::default();
    assert!(est.accepts_rssi(-40.0));
    assert!(est.accepts_rssi(-127.0));
    assert!(!est.accepts_rssi(0.0));
    assert!(!est.accepts_rssi(-128.0));
    assert!(!est.accepts_rssi(f64::NAN));
}

#[test]
fn test_signals_path_substitutes_date() {
    let data = DataConfig {
        root: "/srv/store".to_string(),
        ..Default::default()
    };
    let date = NaiveDate::from_ymd_opt(2025, 10, 3).unwrap();
    assert_eq!(
        data.signals_path(date),
        PathBuf::from("/srv/store/Signals/signals_2025-10-03.csv")
    );
}

#[test]
fn test_load_missing_file_uses_defaults() {
    let cfg = load("/nonexistent/__footfall_config__.toml").unwrap();
    assert_eq!(cfg.footfall.name, "footfall");
}

#[test]
fn test_load_rejects_invalid_values() {
    let tmp = std::env::temp_dir().join("__footfall_test_bad_config__.toml");
    std::fs::write(&tmp, "[smoother]\nalpha = 2.0\n").unwrap();
    let result = load(tmp.to_str().unwrap());
    assert!(matches!(result, Err(FootfallError::Config(_))));
    let _ = std::fs::remove_file(&tmp);
}

#[test]
fn test_shellexpand_home() {
    if let Some(home) = std::env::var_os("HOME") {
        assert_eq!(
            shellexpand("~/.footfall"),
            format!("{}/.footfall", home.to_string_lossy())
        );
    }
    assert_eq!(shellexpand("/abs/path"), "/abs/path");
}

#[test]
fn test_example_config_matches_defaults() {
    let cfg: Config = toml::from_str(include_str!("../../../../config.example.toml")).unwrap();
    cfg.validate().unwrap();
    assert_eq!(cfg.map.width, Config::default().map.width);
    assert_eq!(cfg.estimator.weight, WeightModel::default());
    assert_eq!(cfg.smoother.gap_policy, GapMode::Drop);
}

#[test]
fn test_zones_min_dwell() {
    let cfg: Config = toml::from_str("[zones]\nmin_dwell_minutes = 3.0\n").unwrap();
    assert_eq!(cfg.zones.min_dwell_minutes, 3.0);
    assert_eq!(Config::default().zones.min_dwell_minutes, 1.0);

    let mut bad = Config::default();
    bad.zones.min_dwell_minutes = -1.0;
    assert!(bad.validate().is_err());
}
