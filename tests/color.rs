mod tests {
    use heapless::Vec;
    use ledmux::color::fill_tiled;
    use ledmux::{ColorOrder, Rgb};

    #[test]
    fn test_color_order_names_round_trip() {
        for order in [
            ColorOrder::Rgb,
            ColorOrder::Bgr,
            ColorOrder::Rbg,
            ColorOrder::Grb,
            ColorOrder::Gbr,
            ColorOrder::Brg,
        ] {
            assert_eq!(ColorOrder::from_name(order.name()), Some(order));
        }
        assert_eq!(ColorOrder::from_name("rgbw"), None);
    }

    #[test]
    fn test_color_order_swaps() {
        let c = Rgb { r: 10, g: 20, b: 30 };
        assert_eq!(ColorOrder::Rgb.apply(c), Rgb { r: 10, g: 20, b: 30 });
        assert_eq!(ColorOrder::Bgr.apply(c), Rgb { r: 30, g: 20, b: 10 });
        assert_eq!(ColorOrder::Rbg.apply(c), Rgb { r: 10, g: 30, b: 20 });
        assert_eq!(ColorOrder::Grb.apply(c), Rgb { r: 20, g: 10, b: 30 });
        assert_eq!(ColorOrder::Gbr.apply(c), Rgb { r: 20, g: 30, b: 10 });
        assert_eq!(ColorOrder::Brg.apply(c), Rgb { r: 30, g: 10, b: 20 });
    }

    #[test]
    fn test_apply_all_leaves_rgb_untouched() {
        let mut frame = [Rgb { r: 1, g: 2, b: 3 }, Rgb { r: 4, g: 5, b: 6 }];
        ColorOrder::Rgb.apply_all(&mut frame);
        assert_eq!(frame[0], Rgb { r: 1, g: 2, b: 3 });

        ColorOrder::Grb.apply_all(&mut frame);
        assert_eq!(frame[0], Rgb { r: 2, g: 1, b: 3 });
        assert_eq!(frame[1], Rgb { r: 5, g: 4, b: 6 });
    }

    #[test]
    fn test_fill_tiled_single_color() {
        let red = Rgb { r: 255, g: 0, b: 0 };
        let mut out: Vec<Rgb, 8> = Vec::new();
        fill_tiled(5, &[red], &mut out);
        assert_eq!(out.len(), 5);
        assert!(out.iter().all(|c| *c == red));
    }

    #[test]
    fn test_fill_tiled_cycles_shorter_input() {
        let a = Rgb { r: 1, g: 0, b: 0 };
        let b = Rgb { r: 0, g: 1, b: 0 };
        let mut out: Vec<Rgb, 8> = Vec::new();
        fill_tiled(5, &[a, b], &mut out);
        assert_eq!(&out[..], &[a, b, a, b, a]);
    }

    #[test]
    fn test_fill_tiled_truncates_longer_input() {
        let colors = [
            Rgb { r: 1, g: 0, b: 0 },
            Rgb { r: 2, g: 0, b: 0 },
            Rgb { r: 3, g: 0, b: 0 },
            Rgb { r: 4, g: 0, b: 0 },
        ];
        let mut out: Vec<Rgb, 8> = Vec::new();
        fill_tiled(2, &colors, &mut out);
        assert_eq!(&out[..], &colors[..2]);
    }
}
