use approx::assert_relative_eq;
use nalgebra::Point2;

use pickprep::{
    BoardProcessor, BoardRun, ComponentLibrary, ComponentSpec, NoProgress, NozzleId, NozzleLibrary,
    Placement, ProcessConfig, ProcessParams, ProgressEvent, ReelSize, Side, SlotId, Template,
    TemplateRow,
};

fn placement(refdes: &str, footprint: &str, value: &str, x: f64, y: f64) -> Placement {
    Placement {
        refdes: refdes.into(),
        footprint: footprint.into(),
        value: value.into(),
        x,
        y,
        rotation: 0.0,
        mirrored: false,
    }
}

fn fiducial(refdes: &str, x: f64, y: f64) -> Placement {
    placement(refdes, "FIDUCIAL", "FID", x, y)
}

fn nozzles() -> NozzleLibrary {
    let mut lib = NozzleLibrary::new();
    lib.insert(NozzleId(1), vec![0.0, 90.0, 180.0, 270.0]);
    lib
}

fn library(entries: &[(&str, ReelSize)]) -> ComponentLibrary {
    let mut lib = ComponentLibrary::new();
    for (footprint, reel) in entries {
        lib.insert(
            *footprint,
            ComponentSpec {
                reel: *reel,
                params: ProcessParams::default(),
            },
        );
    }
    lib
}

fn template(slots: &[(u32, ReelSize)]) -> Template {
    let rows = slots
        .iter()
        .map(|(id, reel)| TemplateRow::stack(SlotId(*id), *reel, vec![NozzleId(1)]))
        .collect();
    Template::new(rows, vec![Point2::new(0.0, 0.0), Point2::new(100.0, 0.0)])
}

fn processor(slots: &[(u32, ReelSize)], entries: &[(&str, ReelSize)]) -> BoardProcessor {
    BoardProcessor::new(
        ProcessConfig::default(),
        nozzles(),
        library(entries),
        template(slots),
    )
}

fn run(processor: &BoardProcessor, placements: Vec<Placement>) -> BoardRun {
    processor
        .process(placements, &mut NoProgress)
        .expect("pipeline run")
}

#[test]
fn width_comes_from_a_horizontal_fiducial_pair() {
    let p = processor(&[(1, ReelSize::R8)], &[("CAP0603", ReelSize::R8)]);
    let run = run(
        &p,
        vec![
            fiducial("FID1", 0.0, 0.0),
            fiducial("FID2", 100.0, 0.0),
            placement("C1", "CAP0603", "100nF", 30.0, 10.0),
        ],
    );
    assert_relative_eq!(run.width, 100.0);
}

#[test]
fn matched_plus_unmatched_covers_every_component() {
    let p = processor(
        &[(1, ReelSize::R8)],
        &[("CAP0603", ReelSize::R8), ("SOT-23", ReelSize::R12)],
    );
    // Two groups, one slot: the capacitors place, the transistors cannot.
    let run = run(
        &p,
        vec![
            fiducial("FID1", 0.0, 0.0),
            fiducial("FID2", 100.0, 0.0),
            placement("C1", "CAP0603", "100nF", 10.0, 10.0),
            placement("C2", "CAP0603", "100nF", 20.0, 10.0),
            placement("Q1", "SOT-23", "BC847", 30.0, 10.0),
        ],
    );
    let side = &run.sides[0];
    assert_eq!(side.side, Side::Top);
    assert_eq!(side.matched + side.unmatched, 3);
    assert_eq!(side.matched, 2);
    assert_eq!(side.manual.len(), 1);
    assert_eq!(side.manual[0].refdes, "Q1");
}

#[test]
fn overflow_group_lands_on_the_second_template() {
    let p = processor(
        &[(3, ReelSize::R12)],
        &[("SOT-23", ReelSize::R12), ("SOD-123", ReelSize::R12)],
    );
    let run = run(
        &p,
        vec![
            fiducial("FID1", 0.0, 0.0),
            fiducial("FID2", 100.0, 0.0),
            placement("Q1", "SOT-23", "BC847", 10.0, 10.0),
            placement("Q2", "SOT-23", "BC847", 20.0, 10.0),
            placement("D1", "SOD-123", "1N4148", 30.0, 10.0),
        ],
    );
    let side = &run.sides[0];
    assert_eq!(side.matched, 3);
    assert_eq!(side.unmatched, 0);
    // The larger group took template A's only slot; the diode spilled to B.
    assert_eq!(side.placements_a.len(), 2);
    assert_eq!(side.placements_b.len(), 1);
    assert_eq!(side.placements_b[0].placement.refdes, "D1");
    assert!(side.template_a.rows[0].occupant.is_some());
    assert!(side.template_b.rows[0].occupant.is_some());
}

#[test]
fn second_template_stays_untouched_when_the_first_suffices() {
    let p = processor(&[(3, ReelSize::R12)], &[("SOT-23", ReelSize::R12)]);
    let run = run(
        &p,
        vec![
            fiducial("FID1", 0.0, 0.0),
            fiducial("FID2", 100.0, 0.0),
            placement("Q1", "SOT-23", "BC847", 10.0, 10.0),
        ],
    );
    let side = &run.sides[0];
    assert!(side.template_a.rows[0].occupant.is_some());
    assert!(side.template_b.rows[0].occupant.is_none());
    assert!(side.placements_b.is_empty());
}

#[test]
fn high_count_group_never_takes_the_reserved_slot() {
    // Only the reserved slot exists; six capacitors exceed the default
    // ceiling of 4 and must all go to manual placement.
    let p = processor(&[(20, ReelSize::R8)], &[("CAP0603", ReelSize::R8)]);
    let mut placements = vec![fiducial("FID1", 0.0, 0.0), fiducial("FID2", 100.0, 0.0)];
    for i in 0..6 {
        placements.push(placement(
            &format!("C{i}"),
            "CAP0603",
            "100nF",
            10.0 + i as f64,
            10.0,
        ));
    }
    let run = run(&p, placements);
    let side = &run.sides[0];
    assert_eq!(side.matched, 0);
    assert_eq!(side.unmatched, 6);
    assert!(side.template_a.rows[0].occupant.is_none());
}

#[test]
fn fiducials_are_reprojected_and_copied_to_the_output() {
    // Board frame shifted by (5, 5) against the machine template.
    let p = processor(&[(1, ReelSize::R8)], &[("CAP0603", ReelSize::R8)]);
    let run = run(
        &p,
        vec![
            fiducial("FID1", 5.0, 5.0),
            fiducial("FID2", 105.0, 5.0),
            placement("C1", "CAP0603", "100nF", 35.0, 15.0),
        ],
    );
    let side = &run.sides[0];

    assert_eq!(side.fiducials.len(), 2);
    let fid1 = side.fiducials.iter().find(|f| f.refdes == "FID1").unwrap();
    let fid2 = side.fiducials.iter().find(|f| f.refdes == "FID2").unwrap();
    assert_relative_eq!(fid1.x, 0.0, epsilon = 1e-6);
    assert_relative_eq!(fid1.y, 0.0, epsilon = 1e-6);
    assert_relative_eq!(fid2.x, 100.0, epsilon = 1e-6);
    assert_relative_eq!(fid2.y, 0.0, epsilon = 1e-6);

    let c1 = &side.placements_a[0].placement;
    assert_relative_eq!(c1.x, 30.0, epsilon = 1e-6);
    assert_relative_eq!(c1.y, 10.0, epsilon = 1e-6);
}

#[test]
fn bottom_side_is_mirrored_into_the_machine_frame() {
    let p = processor(&[(1, ReelSize::R8)], &[("CAP0603", ReelSize::R8)]);
    let mut c1 = placement("C1", "CAP0603", "100nF", 30.0, 10.0);
    c1.mirrored = true;
    c1.rotation = 90.0;
    let run = run(
        &p,
        vec![fiducial("FID1", 0.0, 0.0), fiducial("FID2", 100.0, 0.0), c1],
    );

    assert_eq!(run.sides.len(), 1);
    let side = &run.sides[0];
    assert_eq!(side.side, Side::Bottom);
    let placed = &side.placements_a[0].placement;
    assert_relative_eq!(placed.x, 70.0, epsilon = 1e-6);
    assert_relative_eq!(placed.rotation, 90.0, epsilon = 1e-6);
}

#[test]
fn mirror_and_width_share_the_board_frame_under_a_shifted_calibration() {
    // Board frame offset by (5, 5) against the machine template. The
    // component at board x = 35 mirrors against the board width 105 to 70,
    // and the bottom-side calibration (from equally mirrored fiducials)
    // keeps it at machine x = 70. Mirroring against already-calibrated
    // coordinates would land it at 75.
    let p = processor(&[(1, ReelSize::R8)], &[("CAP0603", ReelSize::R8)]);
    let mut c1 = placement("C1", "CAP0603", "100nF", 35.0, 15.0);
    c1.mirrored = true;
    let run = run(
        &p,
        vec![fiducial("FID1", 5.0, 5.0), fiducial("FID2", 105.0, 5.0), c1],
    );

    assert_relative_eq!(run.width, 105.0, epsilon = 1e-6);
    let side = &run.sides[0];
    assert_eq!(side.side, Side::Bottom);
    let placed = &side.placements_a[0].placement;
    assert_relative_eq!(placed.x, 70.0, epsilon = 1e-6);
    assert_relative_eq!(placed.y, 10.0, epsilon = 1e-6);
}

#[test]
fn mirrored_side_survives_a_scaled_calibration() {
    // Machine template twice the board scale: the board component at
    // x = 35 mirrors to 70 in the board frame, and the bottom-side fit
    // (mirrored fiducials onto (0, 0)/(200, 0)) doubles it to 140.
    let p = BoardProcessor::new(
        ProcessConfig::default(),
        nozzles(),
        library(&[("CAP0603", ReelSize::R8)]),
        Template::new(
            vec![TemplateRow::stack(SlotId(1), ReelSize::R8, vec![NozzleId(1)])],
            vec![Point2::new(0.0, 0.0), Point2::new(200.0, 0.0)],
        ),
    );
    let mut c1 = placement("C1", "CAP0603", "100nF", 35.0, 15.0);
    c1.mirrored = true;
    let run = run(
        &p,
        vec![fiducial("FID1", 5.0, 5.0), fiducial("FID2", 105.0, 5.0), c1],
    );

    assert_relative_eq!(run.width, 105.0, epsilon = 1e-6);
    let placed = &run.sides[0].placements_a[0].placement;
    assert_relative_eq!(placed.x, 140.0, epsilon = 1e-6);
}

#[test]
fn distance_sort_anchors_on_the_fiducial_nearest_the_origin() {
    // Fiducials arrive far-first; the exported ordering must still measure
    // distance from the near-origin fiducial.
    let config = ProcessConfig {
        sort_keys: vec![pickprep::SortKey::Distance],
        ..ProcessConfig::default()
    };
    let p = BoardProcessor::new(
        config,
        nozzles(),
        library(&[("CAP0603", ReelSize::R8)]),
        template(&[(1, ReelSize::R8)]),
    );
    let run = run(
        &p,
        vec![
            fiducial("FID2", 100.0, 0.0),
            fiducial("FID1", 0.0, 0.0),
            placement("C1", "CAP0603", "100nF", 90.0, 10.0),
            placement("C2", "CAP0603", "100nF", 10.0, 10.0),
        ],
    );
    let order: Vec<&str> = run.sides[0]
        .placements_a
        .iter()
        .map(|a| a.placement.refdes.as_str())
        .collect();
    assert_eq!(order, ["C2", "C1"]);
}

#[test]
fn large_reel_slot_rotation_is_corrected() {
    // Slot 20 is the reserved slot; a low-count smallest-reel group takes
    // it and its placements get the half-turn mounting correction.
    let p = processor(&[(20, ReelSize::R8)], &[("CAP0603", ReelSize::R8)]);
    let mut c1 = placement("C1", "CAP0603", "100nF", 30.0, 10.0);
    c1.rotation = 90.0;
    let run = run(
        &p,
        vec![fiducial("FID1", 0.0, 0.0), fiducial("FID2", 100.0, 0.0), c1],
    );
    let side = &run.sides[0];
    assert_eq!(side.placements_a[0].slot, SlotId(20));
    assert_relative_eq!(side.placements_a[0].placement.rotation, -90.0, epsilon = 1e-6);
}

#[test]
fn undersized_width_aborts_the_run() {
    let p = processor(&[(1, ReelSize::R8)], &[("CAP0603", ReelSize::R8)]);
    let result = p.process(
        vec![
            fiducial("FID1", 0.0, 0.0),
            fiducial("FID2", 100.0, 0.0),
            // Component beyond width - margin.
            placement("C1", "CAP0603", "100nF", 98.0, 10.0),
        ],
        &mut NoProgress,
    );
    assert!(result.is_err());
}

#[test]
fn bottom_side_with_unconstrained_width_aborts() {
    // A vertical fiducial pair cannot constrain the width; mirroring the
    // bottom side would then be a guess.
    let p = processor(&[(1, ReelSize::R8)], &[("CAP0603", ReelSize::R8)]);
    let mut c1 = placement("C1", "CAP0603", "100nF", 30.0, 10.0);
    c1.mirrored = true;
    let result = p.process(
        vec![fiducial("FID1", 40.0, 5.0), fiducial("FID2", 40.0, 95.0), c1],
        &mut NoProgress,
    );
    assert!(matches!(result, Err(pickprep::ProcessError::Configuration(_))));
}

#[test]
fn progress_is_monotone_and_ends_complete() {
    let p = processor(&[(1, ReelSize::R8)], &[("CAP0603", ReelSize::R8)]);
    let mut events: Vec<ProgressEvent> = Vec::new();
    let mut sink = |e: ProgressEvent| events.push(e);
    p.process(
        vec![
            fiducial("FID1", 0.0, 0.0),
            fiducial("FID2", 100.0, 0.0),
            placement("C1", "CAP0603", "100nF", 30.0, 10.0),
        ],
        &mut sink,
    )
    .expect("pipeline run");

    assert!(!events.is_empty());
    assert!(events.windows(2).all(|w| w[0].current <= w[1].current));
    let last = events.last().unwrap();
    assert_eq!((last.current, last.total), (100, 100));
}
