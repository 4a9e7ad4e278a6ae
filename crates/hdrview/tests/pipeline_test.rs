//! End-to-end preview generation.

use approx::assert_relative_eq;
use hdrview::{
    Backend, ComputeError, Error, Format, ImageBuffer, IoError, KernelDispatcher, PreviewConfig,
    PreviewPipeline, ToneMapper, resample, write_image,
};
use hdrview_io::{MemorySource, SourceSpec, open_source, resample_source};

fn cpu_mapper() -> ToneMapper {
    ToneMapper::from_dispatcher(KernelDispatcher::new(Backend::Cpu).unwrap())
}

fn ramp(width: u32, height: u32, channels: u32, peak: f32) -> Vec<f32> {
    let mut data = Vec::with_capacity((width * height * channels) as usize);
    for y in 0..height {
        for x in 0..width {
            let v = peak * (1 + x + y * width) as f32 / (width * height) as f32;
            for c in 0..channels {
                data.push(if c == 3 { 1.0 } else { v });
            }
        }
    }
    data
}

#[test]
fn test_four_by_four_to_two() {
    let spec = SourceSpec::new(4, 4, &["R", "G", "B"], Format::Unknown);
    let mut source = MemorySource::new(spec, ramp(4, 4, 3, 1.0)).unwrap();
    let preview = resample_source(&mut source, 2, false).unwrap();
    assert_eq!(preview.resized_height(), 2);
    assert_eq!(preview.buffer.len(), 12);
}

#[test]
fn test_opaque_alpha_is_compacted() {
    let spec = SourceSpec::new(16, 8, &["R", "G", "B", "A"], Format::Unknown);
    let mut source = MemorySource::new(spec, ramp(16, 8, 4, 1.0)).unwrap();
    let preview = resample_source(&mut source, 8, false).unwrap();
    // 8 x 4 pixels; four channels before compaction.
    assert_eq!(preview.buffer.len(), 8 * 4 * 4 * 3 / 4);
    assert_eq!(preview.output_channels(), 3);
}

#[test]
fn test_gamma_round_trip() {
    let mapper = cpu_mapper();
    let px = ramp(32, 32, 4, 4.0);
    for g in [2.2f32, 1.8, 0.5] {
        let back = mapper.apply_gamma(&mapper.apply_gamma(&px, g).unwrap(), 1.0 / g).unwrap();
        for (a, b) in px.iter().zip(&back) {
            assert_relative_eq!(a, b, max_relative = 1e-4);
        }
    }
}

#[test]
fn test_unknown_kernel_surfaces() {
    let mapper = cpu_mapper();
    let err = mapper.dispatcher().apply("apply_filmic", &[0.5; 3], &[]).unwrap_err();
    assert!(matches!(err, ComputeError::KernelNotFound(_)));
    let err: Error = err.into();
    assert!(!err.is_backend_failure());
}

#[test]
fn test_hdr_preview_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("plate.hdr");
    let dst = dir.path().join("plate.png");
    write_image(&src, &ramp(64, 48, 3, 50.0), 64, 48, 3).unwrap();

    let config = PreviewConfig::new(16).gamma(2.2).backend(Backend::Cpu);
    let pipeline = PreviewPipeline::new(config).unwrap();
    let report = pipeline.run(&src, &dst).unwrap();

    assert_eq!((report.width, report.height, report.channels), (16, 12, 3));
    assert_eq!((report.original_width, report.original_height), (64, 48));
    assert!(report.tone_mapped);
    assert_eq!(report.backend, "cpu");
    let range = report.dynamic_range.unwrap();
    assert!(range.stops > 5.0);

    let mut written = open_source(&dst).unwrap();
    assert_eq!(written.spec().width, 16);
    assert_eq!(written.spec().height, 12);
    assert!(written.read_scanline(11).is_ok());
}

#[test]
fn test_png_preview_is_not_graded() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("ui.png");
    let dst = dir.path().join("ui_small.jpg");
    write_image(&src, &ramp(20, 10, 4, 1.0), 20, 10, 4).unwrap();

    let pipeline = PreviewPipeline::new(PreviewConfig::new(10).backend(Backend::Cpu)).unwrap();
    let report = pipeline.run(&src, &dst).unwrap();
    assert!(!report.tone_mapped);
    assert!(report.dynamic_range.is_none());
    assert_eq!(report.channels, 3);
    assert!(std::fs::metadata(&dst).unwrap().len() > 0);
}

#[test]
fn test_missing_source_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = PreviewPipeline::new(PreviewConfig::new(8).backend(Backend::Cpu)).unwrap();
    let err = pipeline.run(dir.path().join("gone.exr"), dir.path().join("out.png")).unwrap_err();
    assert!(matches!(err, Error::Io(IoError::SourceUnavailable { .. })));
}

#[test]
fn test_unwritable_destination() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("a.hdr");
    write_image(&src, &ramp(8, 8, 3, 2.0), 8, 8, 3).unwrap();
    let pipeline = PreviewPipeline::new(PreviewConfig::new(4).backend(Backend::Cpu)).unwrap();
    let err = pipeline.run(&src, dir.path().join("missing_dir").join("a.png")).unwrap_err();
    assert!(matches!(err, Error::Io(IoError::WriteFailure { .. })));
}

#[test]
fn test_facade_resample() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("frame.exr");
    let buffer = ImageBuffer::from_samples(ramp(32, 16, 4, 8.0), 32, 16, 4, true).unwrap();
    hdrview_io::write_buffer(&path, &buffer).unwrap();

    let preview = resample(&path, 8).unwrap();
    assert_eq!(preview.resized_height(), 4);
    assert!(preview.dynamic_range.is_some());
}
