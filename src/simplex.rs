//! Nelder-Mead simplex minimizer over `R^n`.
//!
//! A fixed-budget local search: the simplex is reshaped for exactly the
//! requested number of iterations and the best vertex is returned. There is no
//! convergence tolerance and the search never fails.

const REFLECTION: f64 = 1.0;
const EXPANSION: f64 = 2.0;
const CONTRACTION: f64 = 0.5;
const SHRINK: f64 = 0.5;

/// Each non-initial vertex is offset by this share of its dimension's range.
const INITIAL_SPREAD: f64 = 0.20;

#[derive(Debug, Clone, PartialEq)]
pub struct SimplexResult {
    pub point: Vec<f64>,
    pub value: f64,
}

#[derive(Debug, Clone)]
struct Vertex {
    point: Vec<f64>,
    value: f64,
}

pub fn minimize<F>(
    mut objective: F,
    initial: &[f64],
    bounds: &[(f64, f64)],
    iterations: usize,
) -> SimplexResult
where
    F: FnMut(&[f64]) -> f64,
{
    let n = initial.len();
    if n == 0 {
        return SimplexResult {
            point: Vec::new(),
            value: objective(initial),
        };
    }

    let mut simplex = initial_simplex(initial, bounds)
        .into_iter()
        .map(|point| {
            let value = objective(&point);
            Vertex { point, value }
        })
        .collect::<Vec<_>>();

    for _ in 0..iterations {
        sort_vertices(&mut simplex);

        let center = centroid(&simplex[..n]);
        let best_value = simplex[0].value;
        let second_worst_value = simplex[n - 1].value;
        let worst = simplex[n].clone();

        let reflected = along(&center, &worst.point, -REFLECTION);
        let r_value = objective(&reflected);

        if r_value >= best_value && r_value < second_worst_value {
            simplex[n] = Vertex {
                point: reflected,
                value: r_value,
            };
            continue;
        }

        if r_value < best_value {
            let expanded = along(&center, &reflected, EXPANSION);
            let e_value = objective(&expanded);
            simplex[n] = if e_value < r_value {
                Vertex {
                    point: expanded,
                    value: e_value,
                }
            } else {
                Vertex {
                    point: reflected,
                    value: r_value,
                }
            };
            continue;
        }

        let contracted = along(&center, &worst.point, CONTRACTION);
        let c_value = objective(&contracted);
        if c_value < worst.value {
            simplex[n] = Vertex {
                point: contracted,
                value: c_value,
            };
            continue;
        }

        let best = simplex[0].point.clone();
        for vertex in simplex.iter_mut().skip(1) {
            vertex.point = along(&best, &vertex.point, SHRINK);
            vertex.value = objective(&vertex.point);
        }
    }

    sort_vertices(&mut simplex);
    let best = simplex.swap_remove(0);
    SimplexResult {
        point: best.point,
        value: best.value,
    }
}

fn initial_simplex(initial: &[f64], bounds: &[(f64, f64)]) -> Vec<Vec<f64>> {
    let mut out = Vec::with_capacity(initial.len() + 1);
    out.push(initial.to_vec());
    for k in 0..initial.len() {
        let mut point = initial.to_vec();
        let (lo, hi) = bounds.get(k).copied().unwrap_or((0.0, 0.0));
        point[k] += INITIAL_SPREAD * (hi - lo);
        out.push(point);
    }
    out
}

// NaN objective values sort last so they are always the first to be replaced.
fn sort_vertices(simplex: &mut [Vertex]) {
    simplex.sort_by(|a, b| a.value.total_cmp(&b.value));
}

fn centroid(vertices: &[Vertex]) -> Vec<f64> {
    let dims = vertices[0].point.len();
    let count = vertices.len() as f64;
    (0..dims)
        .map(|i| vertices.iter().map(|v| v.point[i]).sum::<f64>() / count)
        .collect()
}

/// `origin + coeff * (target - origin)`.
fn along(origin: &[f64], target: &[f64], coeff: f64) -> Vec<f64> {
    origin
        .iter()
        .zip(target)
        .map(|(o, t)| o + coeff * (t - o))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converges_on_a_bowl() {
        let result = minimize(
            |x| x[0].powi(2) + x[1].powi(2),
            &[5.0, 5.0],
            &[(-10.0, 10.0), (-10.0, 10.0)],
            200,
        );
        assert!(result.value < 1e-3, "value={}", result.value);
        assert!(result.point[0].abs() < 0.05 && result.point[1].abs() < 0.05);
    }

    #[test]
    fn zero_iterations_returns_best_initial_vertex() {
        // Offsets are 20% of the range: vertices at x=0 and x=2.
        let result = minimize(|x| (x[0] - 2.0).powi(2), &[0.0], &[(0.0, 10.0)], 0);
        assert_eq!(result.point, vec![2.0]);
        assert_eq!(result.value, 0.0);
    }

    #[test]
    fn never_worse_than_the_initial_point() {
        let f = |x: &[f64]| (x[0] - 1.0).abs() + (x[1] + 3.0).powi(2) + x[2].sin();
        let init = [4.0, 4.0, 4.0];
        let start = f(&init);
        let result = minimize(f, &init, &[(-5.0, 5.0); 3], 40);
        assert!(result.value <= start);
    }

    #[test]
    fn empty_problem_evaluates_once() {
        let mut calls = 0;
        let result = minimize(
            |_| {
                calls += 1;
                7.0
            },
            &[],
            &[],
            50,
        );
        assert_eq!(calls, 1);
        assert!(result.point.is_empty());
        assert_eq!(result.value, 7.0);
    }

    #[test]
    fn flat_objective_still_runs_full_budget() {
        let mut calls = 0usize;
        let _ = minimize(
            |_| {
                calls += 1;
                1.0
            },
            &[0.0, 0.0],
            &[(0.0, 1.0), (0.0, 1.0)],
            10,
        );
        // 3 initial evaluations, then each iteration evaluates at least once.
        assert!(calls >= 13);
    }
}
