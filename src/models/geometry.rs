//! # Geometry モジュール
//!
//! 防衛側ごとの支配円（アポロニウスの円）と、コントローラ・プランナーが使用する
//! 幾何述語を提供します。
//!
//! 支配円は dist(P, 防衛側) / dist(P, 侵入者) = k となる点Pの軌跡です
//! （k = 防衛側速度 / 侵入者速度）。

use std::f64::consts::PI;

use crate::error::{SimError, SimResult};
use crate::models::common::{Circle, Point};

/// 防衛側と侵入者を同一位置とみなす距離
const COINCIDENT_EPSILON: f64 = 1e-12;
/// 速度比をk=1とみなす許容誤差
const UNIT_RATIO_EPSILON: f64 = 1e-10;

/// 防衛側の支配円を計算
///
/// # 引数
///
/// * `defender_pos` - 防衛側の位置
/// * `intruder_pos` - 侵入者の位置
/// * `speed_ratio` - 速度比 k
///
/// # 戻り値
///
/// 支配円。k=1 の場合は中点を中心とする無限半径の円（垂直二等分線）。
/// 防衛側と侵入者が一致する場合は `SimError::DegenerateGeometry`。
pub fn dominance_circle(defender_pos: &Point, intruder_pos: &Point, speed_ratio: f64) -> SimResult<Circle> {
    let offset = *intruder_pos - *defender_pos;
    let d = offset.magnitude();

    if d < COINCIDENT_EPSILON {
        return Err(SimError::DegenerateGeometry);
    }

    if (speed_ratio - 1.0).abs() < UNIT_RATIO_EPSILON {
        return Ok(Circle::new(defender_pos.midpoint(intruder_pos), f64::INFINITY));
    }

    let k = speed_ratio;
    let (p1, p2) = if k < 1.0 {
        let u = offset * (1.0 / d);
        (
            *defender_pos + u * (d * k / (1.0 + k)),
            *defender_pos - u * (d * k / (1.0 - k)),
        )
    } else {
        (
            *defender_pos + offset * (k / (k + 1.0)),
            *defender_pos + offset * (k / (k - 1.0)),
        )
    };

    let center = p1.midpoint(&p2);
    Ok(Circle::new(center, center.distance_to(&p1)))
}

/// `c1` の円周のうち `c2` の内部にある弧長
///
/// 非対称: `c2` が `c1` の内部にある場合は0を返します。
pub fn arc_intersection_length(c1: &Circle, c2: &Circle) -> f64 {
    if c1.is_unbounded() || c2.is_unbounded() {
        return 0.0;
    }

    let distance = c1.center.distance_to(&c2.center);

    if distance > c1.radius + c2.radius {
        return 0.0;
    }
    if distance + c1.radius <= c2.radius {
        return 2.0 * PI * c1.radius;
    }
    if distance + c2.radius <= c1.radius {
        return 0.0;
    }

    // 余弦定理による半角
    let cos_half_angle =
        (c1.radius.powi(2) + distance.powi(2) - c2.radius.powi(2)) / (2.0 * c1.radius * distance);
    let half_angle = cos_half_angle.clamp(-1.0, 1.0).acos();

    c1.radius * 2.0 * half_angle
}

/// 線分と円周の交点のうち `p_start` に最も近いもの
///
/// 侵入者からゴールへの直線経路が支配円を横切るかの判定に使用します。
/// 無限半径円は常にNoneです。
pub fn segment_circle_intersection(p_start: &Point, p_end: &Point, circle: &Circle) -> Option<Point> {
    if circle.is_unbounded() {
        return None;
    }

    let direction = *p_end - *p_start;
    let to_start = *p_start - circle.center;

    let a = direction.dot(&direction);
    let b = 2.0 * to_start.dot(&direction);
    let c = to_start.dot(&to_start) - circle.radius.powi(2);

    if a < COINCIDENT_EPSILON {
        // 長さゼロの線分
        return if c.abs() < 1e-9 { Some(*p_start) } else { None };
    }

    let discriminant = b * b - 4.0 * a * c;
    if discriminant < 0.0 {
        return None;
    }

    let sqrt_disc = discriminant.sqrt();
    let t1 = (-b - sqrt_disc) / (2.0 * a);
    let t2 = (-b + sqrt_disc) / (2.0 * a);

    [t1, t2]
        .into_iter()
        .find(|t| (0.0..=1.0).contains(t))
        .map(|t| *p_start + direction * t)
}

/// 2円の円周の交点（0〜2点）
pub fn circle_intersection_points(c1: &Circle, c2: &Circle) -> Vec<Point> {
    if !c1.intersects_boundary(c2) {
        return Vec::new();
    }

    let d = c1.center.distance_to(&c2.center);
    if d < COINCIDENT_EPSILON {
        // 同心円（一致する場合は交点が無数）
        return Vec::new();
    }

    let a = (c1.radius.powi(2) - c2.radius.powi(2) + d.powi(2)) / (2.0 * d);
    let h = (c1.radius.powi(2) - a.powi(2)).max(0.0).sqrt();
    let axis = (c2.center - c1.center) * (1.0 / d);
    let base = c1.center + axis * a;

    if h < 1e-10 {
        return vec![base];
    }

    let normal = Point::new(axis.y, -axis.x);
    vec![base + normal * h, base - normal * h]
}

/// 支配円がカバーする保護区域の円周長
pub fn coverage_arc(dominance: &Circle, protected_zone: &Circle) -> f64 {
    arc_intersection_length(protected_zone, dominance)
}

/// 線分上で `point` に最も近い点
pub fn closest_point_on_segment(seg_start: &Point, seg_end: &Point, point: &Point) -> Point {
    let direction = *seg_end - *seg_start;
    let length_sq = direction.dot(&direction);
    if length_sq < COINCIDENT_EPSILON {
        return *seg_start;
    }
    let t = ((*point - *seg_start).dot(&direction) / length_sq).clamp(0.0, 1.0);
    *seg_start + direction * t
}
