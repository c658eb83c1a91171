//! Camera geometry for the predicted scene.
//!
//! Cameras follow the OpenCV convention: `extrinsic = [R | t]` maps world coordinates
//! into the camera frame (`x_cam = R x_world + t`), `intrinsic` is the pinhole matrix
//! `[[fx, 0, cx], [0, fy, cy], [0, 0, 1]]`, and pixel `(u, v)` is column `u`, row `v`.

use ndarray::{s, Array4, ArrayD, Axis, Ix3, Ix4};

use super::model::{ModelError, ScenePredictions};

/// Lift every depth pixel into world coordinates.
///
/// `depth_map [S,H,W,1]`, `extrinsic [S,3,4]`, `intrinsic [S,3,3]` give a world-space
/// point map `[S,H,W,3]`.
pub fn unproject_depth_map(
    depth_map: &ArrayD<f32>,
    extrinsic: &ArrayD<f32>,
    intrinsic: &ArrayD<f32>,
) -> Result<ArrayD<f32>, ModelError> {
    let depth = depth_map
        .view()
        .into_dimensionality::<Ix4>()
        .map_err(|e| ModelError::InvalidOutput(format!("depth_map: {}", e)))?;
    let extrinsic = extrinsic
        .view()
        .into_dimensionality::<Ix3>()
        .map_err(|e| ModelError::InvalidOutput(format!("extrinsic: {}", e)))?;
    let intrinsic = intrinsic
        .view()
        .into_dimensionality::<Ix3>()
        .map_err(|e| ModelError::InvalidOutput(format!("intrinsic: {}", e)))?;

    let (frames, height, width, _) = depth.dim();
    if extrinsic.dim() != (frames, 3, 4) || intrinsic.dim() != (frames, 3, 3) {
        return Err(ModelError::InvalidOutput(format!(
            "camera shapes {:?} / {:?} do not match {} frames",
            extrinsic.shape(),
            intrinsic.shape(),
            frames
        )));
    }

    let mut points = Array4::<f32>::zeros((frames, height, width, 3));

    for frame in 0..frames {
        let k = intrinsic.index_axis(Axis(0), frame);
        let (fx, fy, cx, cy) = (k[[0, 0]], k[[1, 1]], k[[0, 2]], k[[1, 2]]);
        if fx == 0.0 || fy == 0.0 {
            return Err(ModelError::InvalidOutput(format!(
                "frame {} has a zero focal length",
                frame
            )));
        }

        let pose = extrinsic.index_axis(Axis(0), frame);
        let rotation = pose.slice(s![.., ..3]);
        let translation = pose.column(3);

        for v in 0..height {
            for u in 0..width {
                let z = depth[[frame, v, u, 0]];
                let camera = [
                    (u as f32 - cx) * z / fx - translation[0],
                    (v as f32 - cy) * z / fy - translation[1],
                    z - translation[2],
                ];
                // x_world = R^T (x_cam - t)
                for axis in 0..3 {
                    points[[frame, v, u, axis]] = rotation[[0, axis]] * camera[0]
                        + rotation[[1, axis]] * camera[1]
                        + rotation[[2, axis]] * camera[2];
                }
            }
        }
    }

    Ok(points.into_dyn())
}

/// Final point cloud and its confidence.
///
/// With `use_point_map` the point head's output is taken as is; otherwise the depth
/// map is unprojected with the predicted cameras and paired with the depth confidence.
pub fn final_point_cloud(
    predictions: &ScenePredictions,
    use_point_map: bool,
) -> Result<(ArrayD<f32>, ArrayD<f32>), ModelError> {
    if use_point_map {
        return Ok((
            predictions.point_map.clone(),
            predictions.point_conf.clone(),
        ));
    }

    let points = unproject_depth_map(
        &predictions.depth_map,
        &predictions.extrinsic,
        &predictions.intrinsic,
    )?;
    Ok((points, predictions.depth_conf.clone()))
}
