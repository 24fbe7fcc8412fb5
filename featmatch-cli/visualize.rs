use featmatch_core::{Keypoint, Match};
use image::{DynamicImage, GenericImage, GrayImage, Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_circle_mut, draw_line_segment_mut};

use crate::error::CliResult;

const KEYPOINT_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
const MATCH_COLOR: Rgb<u8> = Rgb([0, 255, 0]);

fn draw_circles(canvas: &mut RgbImage, keypoints: &[Keypoint], x_offset: i32) {
    for kp in keypoints {
        let radius = ((kp.size * 0.5).round() as i32).max(1);
        draw_hollow_circle_mut(
            canvas,
            (kp.x.round() as i32 + x_offset, kp.y.round() as i32),
            radius,
            KEYPOINT_COLOR,
        );
    }
}

/// Frame with a circle of the keypoint's size around every keypoint
pub fn draw_keypoints(img: &GrayImage, keypoints: &[Keypoint]) -> RgbImage {
    let mut canvas = DynamicImage::ImageLuma8(img.clone()).into_rgb8();
    draw_circles(&mut canvas, keypoints, 0);
    canvas
}

/// Query and train frames side by side, matched keypoints joined by lines
pub fn draw_matches(
    query_img: &GrayImage,
    query_kps: &[Keypoint],
    train_img: &GrayImage,
    train_kps: &[Keypoint],
    matches: &[Match],
) -> CliResult<RgbImage> {
    let (qw, qh) = query_img.dimensions();
    let (tw, th) = train_img.dimensions();

    let mut canvas = RgbImage::new(qw + tw, qh.max(th));
    canvas.copy_from(&DynamicImage::ImageLuma8(query_img.clone()).into_rgb8(), 0, 0)?;
    canvas.copy_from(&DynamicImage::ImageLuma8(train_img.clone()).into_rgb8(), qw, 0)?;

    draw_circles(&mut canvas, query_kps, 0);
    draw_circles(&mut canvas, train_kps, qw as i32);

    for m in matches {
        let (Some(q), Some(t)) = (query_kps.get(m.query_idx), train_kps.get(m.train_idx)) else {
            continue;
        };
        draw_line_segment_mut(&mut canvas, (q.x, q.y), (t.x + qw as f32, t.y), MATCH_COLOR);
    }

    Ok(canvas)
}
