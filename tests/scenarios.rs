use defgame::models::{
    AgentState, Circle, ClockConfig, ControlState, EvaderPolicyKind, GridConfig, Point, SimConfig, VelocitySource,
    WorldBounds, WorldState,
};
use defgame::scenario::{presets, ScenarioConfig};
use defgame::simulation::{SimulationEngine, Winner};

fn zone() -> Circle {
    Circle::new(Point::ZERO, 2.0)
}

#[test]
fn smart_intruder_reaches_unguarded_zone() {
    let world = WorldState::new(Vec::new(), AgentState::at(Point::new(10.0, 0.0)), zone());
    let grid = GridConfig::new(40, 40, WorldBounds::square(20.0), 1.0, 1000.0);

    let mut engine = SimulationEngine::new(
        world,
        SimConfig::default(),
        grid,
        ClockConfig::default(),
        EvaderPolicyKind::Smart,
        0,
    )
    .unwrap();

    let mut sources = Vec::new();
    let result = engine.run(|snapshot| sources.push(snapshot.evader.source));

    assert_eq!(result.winner, Winner::Intruder);
    assert!(result.final_distance <= 0.9 * 2.0);
    // 約8.2mを4m/sで移動
    assert!(result.time_elapsed < 4.0, "took {}s", result.time_elapsed);
    assert!(sources.iter().all(|source| !source.is_fallback()));
    assert_eq!(sources.first(), Some(&VelocitySource::PlannedPath));
}

#[test]
fn slow_agents_end_in_stalemate() {
    let world = WorldState::new(
        vec![
            AgentState::at(Point::new(-20.0, 20.0)),
            AgentState::at(Point::new(-20.0, -20.0)),
        ],
        AgentState::at(Point::new(30.0, 0.0)),
        zone(),
    );
    let sim = SimConfig::new(0.8, 0.1, 0.2, 2.0, 0.3);
    let grid = GridConfig::new(40, 40, WorldBounds::square(40.0), 1.0, 1000.0);
    let clock = ClockConfig {
        stalemate_time: 5.0,
        ..ClockConfig::default()
    };

    let mut engine = SimulationEngine::new(world, sim, grid, clock, EvaderPolicyKind::Smart, 0).unwrap();
    let result = engine.run(|_| {});

    assert_eq!(result.winner, Winner::Stalemate);
    assert!(result.time_elapsed >= 5.0 && result.time_elapsed < 5.0 + 2.0 * clock.dt);
    assert!(result.final_distance > 3.0 * 2.0);
}

#[test]
fn distant_defenders_and_direct_approach_end_in_stalemate() {
    // 3防衛側とも区域中心から19m
    let world = WorldState::new(
        vec![
            AgentState::at(Point::new(-19.0, 0.0)),
            AgentState::at(Point::new(0.0, 19.0)),
            AgentState::at(Point::new(0.0, -19.0)),
        ],
        AgentState::at(Point::new(30.0, 0.0)),
        zone(),
    );
    let sim = SimConfig::new(0.8, 0.1, 0.2, 2.0, 0.3);
    let grid = GridConfig::new(40, 40, WorldBounds::square(40.0), 1.0, 1000.0);
    let clock = ClockConfig {
        stalemate_time: 5.0,
        ..ClockConfig::default()
    };

    let mut engine = SimulationEngine::new(world, sim, grid, clock, EvaderPolicyKind::Direct, 0).unwrap();
    let result = engine.run(|snapshot| assert_eq!(snapshot.evader.source, VelocitySource::Direct));

    assert_eq!(result.winner, Winner::Stalemate);
    assert!(result.time_elapsed >= 5.0 && result.time_elapsed < 5.0 + 2.0 * clock.dt);
    // 直進で5秒間に1m接近
    assert!((result.final_distance - 29.0).abs() < 0.1, "distance {}", result.final_distance);
}

#[test]
fn every_preset_ends_with_its_intended_winner() {
    let expected = [
        ("intercept_success", Winner::Defenders),
        ("intruder_breakthrough", Winner::Intruder),
        ("engage_cooperative", Winner::Defenders),
        ("travel_positioning", Winner::Defenders),
        ("fast_intruder_breakthrough", Winner::Intruder),
        ("single_defender_overwhelmed", Winner::Intruder),
        ("smart_pathfinding_around_defenders", Winner::Defenders),
        ("close_call_near_miss", Winner::Defenders),
        ("actual_stalemate", Winner::Stalemate),
    ];
    assert_eq!(expected.len(), presets::preset_names().len());

    for (name, winner) in expected {
        let mut engine = presets::preset(name).unwrap().build_engine(0).unwrap();
        let result = engine.run(|_| {});
        assert_eq!(result.winner, winner, "preset {} ({})", name, result.reason);
    }
}

#[test]
fn named_presets_pass_through_their_control_state() {
    for (name, state) in [
        ("engage_cooperative", ControlState::Engage),
        ("travel_positioning", ControlState::Travel),
    ] {
        let mut engine = presets::preset(name).unwrap().build_engine(0).unwrap();
        let mut seen = false;
        engine.run(|snapshot| seen |= snapshot.state.states.contains(&state));
        assert!(seen, "preset {} never entered {:?}", name, state);
    }
}

#[test]
fn snapshots_are_consecutive_and_clock_is_step_times_dt() {
    let scenario = presets::preset("engage_cooperative").unwrap();
    let dt = scenario.sim.dt_s;
    let mut engine = scenario.build_engine(0).unwrap();

    let mut expected_step = 1;
    let result = engine.run(|snapshot| {
        assert_eq!(snapshot.state.step, expected_step);
        assert!((snapshot.state.elapsed - expected_step as f64 * dt).abs() < 1e-9);
        assert_eq!(snapshot.commands.len(), snapshot.state.world.defenders.len());
        expected_step += 1;
    });

    assert_eq!(engine.state.step, expected_step - 1);
    assert!((result.time_elapsed - engine.state.elapsed).abs() < 1e-12);
}

#[test]
fn intercept_is_never_left_during_a_run() {
    for name in presets::preset_names() {
        let mut engine = presets::preset(name).unwrap().build_engine(0).unwrap();
        let mut previous: Vec<ControlState> = engine.state.states.clone();

        engine.run(|snapshot| {
            for (before, after) in previous.iter().zip(&snapshot.state.states) {
                if *before == ControlState::Intercept {
                    assert_eq!(*after, ControlState::Intercept, "preset {}", name);
                }
            }
            previous = snapshot.state.states.clone();
        });
    }
}

#[test]
fn every_preset_terminates_within_its_time_limit() {
    for name in presets::preset_names() {
        let scenario = presets::preset(name).unwrap();
        let limit = scenario.sim.t_max_s + scenario.sim.dt_s;
        let mut engine = scenario.build_engine(0).unwrap();

        let result = engine.run(|_| {});

        assert!(result.time_elapsed <= limit, "preset {} ran {}s", name, result.time_elapsed);
        assert!(result.final_distance.is_finite());
        assert!(!result.reason.is_empty());
    }
}

#[test]
fn defender_velocities_respect_speed_limit_during_run() {
    let scenario = presets::preset("intercept_success").unwrap();
    let max_speed = scenario.agents.defender_speed_mps;
    let mut engine = scenario.build_engine(0).unwrap();

    engine.run(|snapshot| {
        for command in &snapshot.commands {
            assert!(command.velocity.magnitude() <= max_speed + 1e-9);
        }
    });
}

#[test]
fn scenario_files_load_and_run() {
    for path in ["scenarios/baseline.yaml", "scenarios/direct_rush.yaml"] {
        let scenario = ScenarioConfig::from_file(path).unwrap();
        let mut engine = scenario.build_engine(0).unwrap();

        let result = engine.run(|_| {});
        assert!(result.time_elapsed <= scenario.sim.t_max_s + scenario.sim.dt_s, "{}", path);
    }
}

#[test]
fn direct_rush_scenario_uses_direct_policy() {
    let scenario = ScenarioConfig::from_file("scenarios/direct_rush.yaml").unwrap();
    assert_eq!(scenario.intruder.policy, EvaderPolicyKind::Direct);

    let mut engine = scenario.build_engine(0).unwrap();
    assert_eq!(engine.policy_name(), "direct");

    engine.run(|snapshot| {
        assert_eq!(snapshot.evader.source, VelocitySource::Direct);
        assert!(snapshot.evader.path.is_none());
    });
}
