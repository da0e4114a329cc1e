use proptest::prelude::*;
use robot_head_core::{decode, encode, map, ActuatorState, AxisKind, BlendshapeInput, HeadState, RecordingTransport};

fn axis() -> impl Strategy<Value = AxisKind> {
    prop_oneof![
        Just(AxisKind::Mouth),
        Just(AxisKind::EyePosition),
        Just(AxisKind::Eyelid),
    ]
}

proptest! {
    #[test]
    fn encode_always_yields_a_decodable_in_range_command(axis in axis(), value in any::<i64>()) {
        let cmd = encode(axis, value);
        let (decoded_axis, v) = decode(cmd.as_str()).unwrap();
        prop_assert_eq!(decoded_axis, axis);
        prop_assert!(axis.contains(v as i64));
        prop_assert!(cmd.as_str().starts_with(axis.prefix()));
        prop_assert!(cmd.as_str().ends_with('!'));
    }

    #[test]
    fn clamp_is_identity_inside_range_and_saturates_outside(axis in axis(), value in -1000i64..1000) {
        let v = axis.clamp(value) as i64;
        if axis.contains(value) {
            prop_assert_eq!(v, value);
        } else if value < axis.min() as i64 {
            prop_assert_eq!(v, axis.min() as i64);
        } else {
            prop_assert_eq!(v, axis.max() as i64);
        }
    }

    #[test]
    fn actuator_state_tracks_the_last_clamped_write(
        writes in proptest::collection::vec((axis(), any::<i64>()), 0..32)
    ) {
        let sink = RecordingTransport::new();
        let mut head = ActuatorState::new(sink.clone());
        let mut expected = HeadState::default();
        for (axis, value) in &writes {
            head.set_axis(*axis, *value);
            let v = axis.clamp(*value);
            match axis {
                AxisKind::Mouth => expected.mouth = v,
                AxisKind::EyePosition => expected.eye_pos = v,
                AxisKind::Eyelid => expected.eyelid = v,
            }
        }
        prop_assert_eq!(head.get_state(), expected);
        prop_assert_eq!(sink.commands().len(), writes.len());
    }

    #[test]
    fn mapper_output_is_always_in_range(
        jaw in weight(),
        blink_l in weight(),
        blink_r in weight(),
        up in weight(),
        down in weight(),
        out in weight(),
        inward in weight(),
    ) {
        let input: BlendshapeInput = [
            ("jawOpen", jaw),
            ("eyeBlinkLeft", blink_l),
            ("eyeBlinkRight", blink_r),
            ("eyeLookUpLeft", up),
            ("eyeLookDownLeft", down),
            ("eyeLookOutLeft", out),
            ("eyeLookInLeft", inward),
        ]
        .into_iter()
        .collect();
        let pose = map(&input);
        prop_assert!(AxisKind::Mouth.contains(pose.mouth as i64));
        prop_assert!(AxisKind::EyePosition.contains(pose.eye_pos as i64));
        prop_assert!((1..=3).contains(&pose.eyelid));
        prop_assert_eq!(map(&input), pose);
    }

    #[test]
    fn blink_pairs_averaging_to_a_threshold_take_the_lower_tier(
        offset in 0u32..=30,
        threshold in prop_oneof![Just(0.3f64), Just(0.7f64)],
    ) {
        // Pairs of hundredths keep both weights exact decimal literals.
        let delta = offset as f64 / 100.0;
        let left = format!("{:.2}", threshold - delta);
        let right = format!("{:.2}", threshold + delta);
        let input = BlendshapeInput::from_json(&format!(
            r#"{{"eyeBlinkLeft": {left}, "eyeBlinkRight": {right}}}"#
        ))
        .unwrap();
        let avg = (input.get("eyeBlinkLeft") + input.get("eyeBlinkRight")) / 2.0;
        prop_assume!(avg == threshold);
        let expected = if threshold == 0.7 { 2 } else { 1 };
        prop_assert_eq!(map(&input).eyelid, expected);
    }
}

/// Unit-range weights mixed with out-of-range, huge and non-finite ones.
fn weight() -> impl Strategy<Value = f64> {
    prop_oneof![
        4 => 0.0f64..=1.0,
        1 => -10.0f64..10.0,
        1 => any::<f64>(),
        1 => prop_oneof![
            Just(f64::INFINITY),
            Just(f64::NEG_INFINITY),
            Just(f64::NAN),
            Just(f64::MAX),
            Just(1e39),
        ],
    ]
}
