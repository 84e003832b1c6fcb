use anyhow::Result;
use promonitor::config::Config;
use tempfile::tempdir;

#[test]
fn test_config_load_and_save() -> Result<()> {
    // Create a temporary directory
    let temp_dir = tempdir()?;
    let config_path = temp_dir.path().join("config.yaml");

    // Create a custom config
    let mut config = Config::default();
    config.visualization.port = 8081;
    config.visualization.address = "192.168.1.1".to_string();
    config.visualization.name = "TestServer".to_string();
    config.modbus.port = 1502;
    config.simulation.interval_secs = 3;

    // Save config to file
    config.save_to_file(&config_path)?;

    // Load config from file
    let loaded_config = Config::from_file(&config_path)?;

    // Verify loaded config matches original
    assert_eq!(loaded_config.visualization.port, 8081);
    assert_eq!(loaded_config.visualization.address, "192.168.1.1");
    assert_eq!(loaded_config.visualization.name, "TestServer");
    assert_eq!(loaded_config.modbus.port, 1502);
    assert_eq!(loaded_config.simulation.interval_secs, 3);
    assert_eq!(loaded_config.sensors.len(), config.sensors.len());

    // Test loading default config for non-existent file
    let non_existent_path = temp_dir.path().join("non_existent.yaml");
    let default_config = Config::from_file(&non_existent_path)?;

    // Verify default config was created
    assert!(non_existent_path.exists());
    assert_eq!(default_config.visualization.port, 8080);
    assert_eq!(default_config.visualization.address, "127.0.0.1");
    assert_eq!(default_config.modbus.port, 5020);

    // Test apply_args method
    let mut config = Config::default();
    assert_eq!(config.visualization.port, 8080);
    assert_eq!(config.visualization.address, "127.0.0.1");

    // Apply command-line arguments
    config.apply_args(
        Some(9000),
        Some("192.168.0.1".to_string()),
        Some(false),
        Some("0.0.0.0".to_string()),
        Some(1502),
        Some(1),
    );

    // Verify values were overridden
    assert_eq!(config.visualization.port, 9000);
    assert_eq!(config.visualization.address, "192.168.0.1");
    assert!(!config.modbus.enabled);
    assert_eq!(config.modbus.address, "0.0.0.0");
    assert_eq!(config.modbus.port, 1502);
    assert_eq!(config.simulation.interval_secs, 1);

    Ok(())
}

#[test]
fn test_default_register_map() {
    let config = Config::default();

    // The default sensor population carries the fixed register map:
    // temperature at 1000, humidity at 2000, pressure at 3000, power at
    // 4000 and CO2 at 5000, two registers per sensor.
    let find = |id: &str| {
        config
            .sensors
            .iter()
            .find(|s| s.id == id)
            .unwrap_or_else(|| panic!("missing sensor {id}"))
    };
    assert_eq!(find("temp_b1").address, 1000);
    assert_eq!(find("temp_b4").address, 1006);
    assert_eq!(find("hum_b3").address, 2004);
    assert_eq!(find("press_b2").address, 3002);
    assert_eq!(find("power_b3").address, 4004);
    assert_eq!(find("co2_b2").address, 5002);

    // Every default sensor starts inside its configured range.
    for sensor in &config.sensors {
        assert!(sensor.min < sensor.max, "{} has empty range", sensor.id);
        assert!(
            sensor.initial >= sensor.min && sensor.initial <= sensor.max,
            "{} starts out of range",
            sensor.id
        );
    }
}

#[test]
fn test_config_validation() -> Result<()> {
    let temp_dir = tempdir()?;

    // An out-of-range simulation interval is rejected on load
    let config_path = temp_dir.path().join("bad_interval.yaml");
    let mut config = Config::default();
    config.simulation.interval_secs = 30;
    config.save_to_file(&config_path)?;
    assert!(Config::from_file(&config_path).is_err());

    // An odd sensor base address is rejected
    let config_path = temp_dir.path().join("odd_address.yaml");
    let mut config = Config::default();
    config.sensors[0].address = 1001;
    config.save_to_file(&config_path)?;
    assert!(Config::from_file(&config_path).is_err());

    // Overlapping register ranges are rejected (1000 and 1001 collide)
    let config_path = temp_dir.path().join("overlap.yaml");
    let mut config = Config::default();
    config.sensors[1].address = config.sensors[0].address;
    config.save_to_file(&config_path)?;
    assert!(Config::from_file(&config_path).is_err());

    // Duplicate sensor ids are rejected
    let config_path = temp_dir.path().join("dup_id.yaml");
    let mut config = Config::default();
    config.sensors[1].id = config.sensors[0].id.clone();
    config.save_to_file(&config_path)?;
    assert!(Config::from_file(&config_path).is_err());

    // An initial value outside [min, max] is rejected
    let config_path = temp_dir.path().join("bad_initial.yaml");
    let mut config = Config::default();
    config.sensors[0].initial = config.sensors[0].max + 100.0;
    config.save_to_file(&config_path)?;
    assert!(Config::from_file(&config_path).is_err());

    Ok(())
}

#[test]
fn test_invalid_config_creates_sample() -> Result<()> {
    let temp_dir = tempdir()?;
    let config_path = temp_dir.path().join("config.yaml");

    // A config that fails schema validation (port must be an integer)
    std::fs::write(&config_path, "modbus:\n  port: \"not a number\"\n")?;
    assert!(Config::from_file(&config_path).is_err());

    // A sample file with default values must have been generated next to it
    let sample_path = temp_dir.path().join("config.sample.yaml");
    assert!(sample_path.exists());
    let sample = Config::from_file(&sample_path)?;
    assert_eq!(sample.visualization.port, 8080);

    Ok(())
}

#[test]
fn test_minimal_config_falls_back_to_defaults() -> Result<()> {
    let temp_dir = tempdir()?;
    let config_path = temp_dir.path().join("minimal.yaml");

    // Only one section present; everything else comes from defaults
    std::fs::write(&config_path, "modbus:\n  port: 1502\n")?;
    let config = Config::from_file(&config_path)?;

    assert_eq!(config.modbus.port, 1502);
    assert_eq!(config.visualization.port, 8080);
    assert_eq!(config.simulation.interval_secs, 2);
    assert!(!config.sensors.is_empty());

    Ok(())
}
