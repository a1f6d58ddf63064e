mod tests {
    use embassy_time::Instant;
    use ledmux::{
        BACKGROUND_PRIORITY, Component, ImageFrame, LOWEST_PRIORITY, MuxerError, PriorityMuxer,
        Rgb, TIMEOUT_ENDLESS,
    };

    const RED: Rgb = Rgb { r: 255, g: 0, b: 0 };
    const GREEN: Rgb = Rgb { r: 0, g: 255, b: 0 };
    const BLUE: Rgb = Rgb { r: 0, g: 0, b: 255 };

    fn muxer() -> PriorityMuxer<8, 16> {
        PriorityMuxer::new(4)
    }

    fn register(muxer: &mut PriorityMuxer<8, 16>, priority: i32) {
        muxer.register_input(priority, Component::Color, "test", "", 0);
    }

    #[test]
    fn test_write_requires_registration() {
        let mut muxer = muxer();
        let result = muxer.set_input(50, &[RED], TIMEOUT_ENDLESS, Instant::from_millis(0));
        assert_eq!(result, Err(MuxerError::RegistrationRequired));
    }

    #[test]
    fn test_lowest_active_priority_wins() {
        let mut muxer = muxer();
        register(&mut muxer, 100);
        register(&mut muxer, 50);
        muxer
            .set_input(100, &[GREEN], TIMEOUT_ENDLESS, Instant::from_millis(0))
            .unwrap();
        muxer
            .set_input(50, &[RED], TIMEOUT_ENDLESS, Instant::from_millis(0))
            .unwrap();

        let update = muxer.update(Instant::from_millis(0));
        assert_eq!(update.visible_changed, Some(50));
        assert!(update.priorities_changed);
        assert_eq!(muxer.current_priority(), 50);
        assert_eq!(muxer.current_info().led_colors[0], RED);
    }

    #[test]
    fn test_registered_but_idle_channel_is_not_arbitrated() {
        let mut muxer = muxer();
        register(&mut muxer, 10);
        register(&mut muxer, 50);
        muxer
            .set_input(50, &[RED], TIMEOUT_ENDLESS, Instant::from_millis(0))
            .unwrap();

        muxer.update(Instant::from_millis(0));
        // Priority 10 is registered but holds no data yet.
        assert_eq!(muxer.current_priority(), 50);
        assert_eq!(&muxer.priorities()[..], &[50]);
    }

    #[test]
    fn test_no_active_channel_falls_back_to_black_sentinel() {
        let mut muxer = muxer();
        let update = muxer.update(Instant::from_millis(0));
        assert_eq!(update.visible_changed, None);
        assert_eq!(muxer.current_priority(), LOWEST_PRIORITY);

        let info = muxer.current_info();
        assert_eq!(info.priority, LOWEST_PRIORITY);
        assert_eq!(info.led_colors.len(), 4);
        assert!(info.led_colors.iter().all(|c| *c == Rgb { r: 0, g: 0, b: 0 }));
    }

    #[test]
    fn test_expiry_is_strict() {
        let mut muxer = muxer();
        register(&mut muxer, 50);
        muxer
            .set_input(50, &[RED], 1000, Instant::from_millis(0))
            .unwrap();

        // Still active at exactly the deadline.
        muxer.update(Instant::from_millis(1000));
        assert_eq!(muxer.current_priority(), 50);

        // Gone one millisecond later.
        let update = muxer.update(Instant::from_millis(1001));
        assert_eq!(update.visible_changed, Some(LOWEST_PRIORITY));
        assert!(update.priorities_changed);
        assert!(!muxer.has_priority(50));
    }

    #[test]
    fn test_expiring_overlay_reveals_endless_background() {
        let mut muxer = muxer();
        register(&mut muxer, 50);
        register(&mut muxer, 10);
        muxer
            .set_input(50, &[BLUE], TIMEOUT_ENDLESS, Instant::from_millis(0))
            .unwrap();
        muxer
            .set_input(10, &[RED], 1000, Instant::from_millis(0))
            .unwrap();

        let update = muxer.update(Instant::from_millis(0));
        assert_eq!(update.visible_changed, Some(10));

        muxer.update(Instant::from_millis(500));
        assert_eq!(muxer.current_priority(), 10);

        let update = muxer.update(Instant::from_millis(1001));
        assert_eq!(update.visible_changed, Some(50));
        assert_eq!(muxer.current_info().led_colors[0], BLUE);
    }

    #[test]
    fn test_reregister_refreshes_metadata_only() {
        let mut muxer = muxer();
        register(&mut muxer, 50);
        muxer
            .set_input(50, &[RED], 5000, Instant::from_millis(0))
            .unwrap();
        let timeout_before = muxer.input_info(50).unwrap().timeout_time_ms;

        muxer.register_input(50, Component::Grabber, "grabber", "hdmi", 2);

        let info = muxer.input_info(50).unwrap();
        assert_eq!(info.component, Component::Grabber);
        assert_eq!(info.smooth_cfg, 2);
        assert_eq!(info.led_colors[0], RED);
        assert_eq!(info.timeout_time_ms, timeout_before);
    }

    #[test]
    fn test_update_reports_each_change_once() {
        let mut muxer = muxer();
        register(&mut muxer, 50);
        muxer
            .set_input(50, &[RED], TIMEOUT_ENDLESS, Instant::from_millis(0))
            .unwrap();

        let first = muxer.update(Instant::from_millis(0));
        assert_eq!(first.visible_changed, Some(50));
        assert!(first.priorities_changed);

        // Nothing changed; no edges on the second pass.
        let second = muxer.update(Instant::from_millis(10));
        assert_eq!(second.visible_changed, None);
        assert!(!second.priorities_changed);
    }

    #[test]
    fn test_manual_pin_overrides_lower_priority() {
        let mut muxer = muxer();
        register(&mut muxer, 10);
        register(&mut muxer, 100);
        muxer
            .set_input(10, &[RED], TIMEOUT_ENDLESS, Instant::from_millis(0))
            .unwrap();
        muxer
            .set_input(100, &[GREEN], TIMEOUT_ENDLESS, Instant::from_millis(0))
            .unwrap();

        assert!(muxer.set_priority(100));
        assert!(!muxer.is_source_auto_select());
        muxer.update(Instant::from_millis(0));
        assert_eq!(muxer.current_priority(), 100);

        // Back to lowest-wins.
        muxer.set_source_auto_select(true);
        let update = muxer.update(Instant::from_millis(10));
        assert_eq!(update.visible_changed, Some(10));
    }

    #[test]
    fn test_pin_of_unknown_priority_is_refused() {
        let mut muxer = muxer();
        assert!(!muxer.set_priority(42));
        assert!(muxer.is_source_auto_select());
    }

    #[test]
    fn test_expired_pin_reenables_auto_select() {
        let mut muxer = muxer();
        register(&mut muxer, 10);
        register(&mut muxer, 20);
        muxer
            .set_input(10, &[RED], 500, Instant::from_millis(0))
            .unwrap();
        muxer
            .set_input(20, &[GREEN], TIMEOUT_ENDLESS, Instant::from_millis(0))
            .unwrap();

        assert!(muxer.set_priority(10));
        muxer.update(Instant::from_millis(0));
        assert_eq!(muxer.current_priority(), 10);

        let update = muxer.update(Instant::from_millis(501));
        assert!(muxer.is_source_auto_select());
        assert_eq!(update.visible_changed, Some(20));
        assert_eq!(muxer.previous_priority(), 10);
    }

    #[test]
    fn test_clear_protected_priority_is_rejected() {
        let mut muxer = muxer();
        register(&mut muxer, BACKGROUND_PRIORITY);
        muxer
            .set_input(
                BACKGROUND_PRIORITY,
                &[BLUE],
                TIMEOUT_ENDLESS,
                Instant::from_millis(0),
            )
            .unwrap();

        assert_eq!(
            muxer.clear_input(BACKGROUND_PRIORITY),
            Err(MuxerError::RejectedClear)
        );
        assert!(muxer.has_priority(BACKGROUND_PRIORITY));
    }

    #[test]
    fn test_clear_unknown_priority_reports_false() {
        let mut muxer = muxer();
        assert_eq!(muxer.clear_input(42), Ok(false));
    }

    #[test]
    fn test_clear_all_spares_protected_unless_forced() {
        let mut muxer = muxer();
        register(&mut muxer, 10);
        register(&mut muxer, 100);
        register(&mut muxer, BACKGROUND_PRIORITY);
        muxer
            .set_input(10, &[RED], TIMEOUT_ENDLESS, Instant::from_millis(0))
            .unwrap();
        muxer
            .set_input(100, &[GREEN], TIMEOUT_ENDLESS, Instant::from_millis(0))
            .unwrap();
        muxer
            .set_input(
                BACKGROUND_PRIORITY,
                &[BLUE],
                TIMEOUT_ENDLESS,
                Instant::from_millis(0),
            )
            .unwrap();

        muxer.clear_all(false);
        let update = muxer.update(Instant::from_millis(0));
        assert_eq!(update.visible_changed, Some(BACKGROUND_PRIORITY));
        assert_eq!(&muxer.priorities()[..], &[BACKGROUND_PRIORITY]);

        muxer.clear_all(true);
        let update = muxer.update(Instant::from_millis(10));
        assert_eq!(update.visible_changed, Some(LOWEST_PRIORITY));
        assert!(muxer.priorities().is_empty());
    }

    #[test]
    fn test_set_inactive_keeps_registration() {
        let mut muxer = muxer();
        register(&mut muxer, 50);
        muxer
            .set_input(50, &[RED], TIMEOUT_ENDLESS, Instant::from_millis(0))
            .unwrap();
        muxer.update(Instant::from_millis(0));
        assert_eq!(muxer.current_priority(), 50);

        assert!(muxer.set_input_inactive(50));
        let update = muxer.update(Instant::from_millis(10));
        assert_eq!(update.visible_changed, Some(LOWEST_PRIORITY));
        assert!(muxer.has_priority(50));
        assert!(!muxer.input_info(50).unwrap().is_active());
    }

    #[test]
    fn test_single_pixel_image_counts_as_plain_color() {
        let mut muxer = muxer();
        register(&mut muxer, 50);
        muxer
            .set_input_image(
                50,
                ImageFrame::solid(RED),
                TIMEOUT_ENDLESS,
                Instant::from_millis(0),
            )
            .unwrap();
        assert!(!muxer.input_info(50).unwrap().has_image());

        let pixels = [RED, GREEN, RED, GREEN];
        muxer
            .set_input_image(
                50,
                ImageFrame::new(2, 2, &pixels).unwrap(),
                TIMEOUT_ENDLESS,
                Instant::from_millis(0),
            )
            .unwrap();
        assert!(muxer.input_info(50).unwrap().has_image());
    }

    #[test]
    fn test_color_write_replaces_image_payload() {
        let mut muxer = muxer();
        register(&mut muxer, 50);
        let pixels = [RED, GREEN, RED, GREEN];
        muxer
            .set_input_image(
                50,
                ImageFrame::new(2, 2, &pixels).unwrap(),
                TIMEOUT_ENDLESS,
                Instant::from_millis(0),
            )
            .unwrap();
        muxer
            .set_input(50, &[BLUE], TIMEOUT_ENDLESS, Instant::from_millis(0))
            .unwrap();

        let info = muxer.input_info(50).unwrap();
        assert!(info.image.is_none());
        assert_eq!(info.led_colors[0], BLUE);
    }
}
