//! Polygon clipping and triangulation tests

#[cfg(test)]
mod tests {
    use ground_engine::polygon::{self, Polygons};
    use ground_engine::Point;

    fn square(x: i32, y: i32, size: i32) -> Polygons {
        Polygons::rect(x, y, x + size, y + size)
    }

    // -----------------------------------------------------------------------
    // Construction
    // -----------------------------------------------------------------------

    #[test]
    fn degenerate_contours_are_dropped() {
        let polys = Polygons::new(vec![
            vec![Point::new(0, 0), Point::new(10, 0)],
            vec![Point::new(0, 0), Point::new(5, 5), Point::new(10, 10)],
            vec![
                Point::new(0, 0),
                Point::new(4, 0),
                Point::new(4, 4),
                Point::new(0, 4),
                Point::new(0, 0),
            ],
        ]);
        assert_eq!(polys.contours.len(), 1);
        assert_eq!(polys.contours[0].len(), 4);
        assert_eq!(polys.area(), 16.0);
    }

    #[test]
    fn bounds_of_empty_set_is_none() {
        assert!(Polygons::empty().bounds().is_none());
        let (min, max) = square(-5, 3, 10).bounds().expect("bounds");
        assert_eq!(min, Point::new(-5, 3));
        assert_eq!(max, Point::new(5, 13));
    }

    // -----------------------------------------------------------------------
    // Boolean operations
    // -----------------------------------------------------------------------

    #[test]
    fn empty_operands() {
        let a = square(0, 0, 10);
        let empty = Polygons::empty();
        assert_eq!(polygon::union(&a, &empty), a);
        assert_eq!(polygon::union(&empty, &a), a);
        assert_eq!(polygon::difference(&a, &empty), a);
        assert!(polygon::difference(&empty, &a).is_empty());
        assert!(polygon::intersection(&a, &empty).is_empty());
        assert_eq!(polygon::xor(&empty, &a), a);
    }

    #[test]
    fn xor_with_itself_is_empty() {
        let a = square(0, 0, 64);
        assert!(polygon::xor(&a, &a).is_empty());
    }

    #[test]
    fn union_of_overlapping_squares() {
        let u = polygon::union(&square(0, 0, 10), &square(5, 0, 10));
        assert_eq!(u.area(), 150.0);
        assert!(u.contains(Point::new(12, 5)));
    }

    #[test]
    fn difference_punches_a_hole() {
        let holed = polygon::difference(&square(0, 0, 100), &square(25, 25, 50));
        assert_eq!(holed.area(), 7500.0);
        assert!(holed.contains(Point::new(10, 10)));
        assert!(!holed.contains(Point::new(50, 50)));

        let shapes = holed.shapes();
        assert_eq!(shapes.len(), 1);
        assert_eq!(shapes[0].holes.len(), 1);
    }

    #[test]
    fn intersection_clips_to_overlap() {
        let i = polygon::intersection(&square(0, 0, 10), &square(5, 5, 10));
        assert_eq!(i.area(), 25.0);
        assert_eq!(i.bounds(), Some((Point::new(5, 5), Point::new(10, 10))));
    }

    #[test]
    fn self_intersecting_input_is_sanitised() {
        let bowtie = Polygons::new(vec![vec![
            Point::new(0, 0),
            Point::new(10, 10),
            Point::new(10, 0),
            Point::new(0, 10),
        ]]);
        let clean = polygon::sanitize(&bowtie);
        assert!(!clean.is_empty());
        assert!((clean.area() - 50.0).abs() < 1.0);
    }

    #[test]
    fn boundary_points_are_outside() {
        let a = square(0, 0, 10);
        assert!(!a.contains(Point::new(0, 5)));
        assert!(!a.contains(Point::new(10, 10)));
        assert!(a.contains(Point::new(1, 1)));
    }

    // -----------------------------------------------------------------------
    // Triangulation
    // -----------------------------------------------------------------------

    #[test]
    fn triangulation_preserves_area_with_holes() {
        let holed = polygon::difference(&square(0, 0, 100), &square(25, 25, 50));
        let triangles = polygon::triangulate(&holed);
        assert!(!triangles.is_empty());
        assert!((polygon::triangles_area(&triangles) - 7500.0).abs() < 1e-6);
    }

    #[test]
    fn triangulation_handles_disjoint_shapes() {
        let two = polygon::union(&square(0, 0, 10), &square(20, 0, 10));
        assert_eq!(two.shapes().len(), 2);
        let triangles = polygon::triangulate(&two);
        assert_eq!(triangles.len(), 4);
        assert_eq!(polygon::triangles_area(&triangles), 200.0);
    }

    #[test]
    fn triangulating_nothing_yields_nothing() {
        assert!(polygon::triangulate(&Polygons::empty()).is_empty());
    }
}
