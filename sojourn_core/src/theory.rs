//! Closed-form expected sojourn times.

use crate::error::SimError;

/// Expected sojourn time of an M/M/1 queue: `R = 1 / (μ − λ)`.
///
/// # Errors
/// - `SimError::Configuration` for non-positive rates
/// - `SimError::Instability` when `μ <= λ`
pub fn mm1_sojourn(arrival_rate: f64, service_rate: f64) -> Result<f64, SimError> {
    check_rates(arrival_rate, service_rate)?;
    if service_rate <= arrival_rate {
        return Err(SimError::Instability {
            arrival_rate,
            service_capacity: service_rate,
        });
    }
    Ok(1.0 / (service_rate - arrival_rate))
}

/// Expected sojourn time of an M/M/c queue.
///
/// # Formula
/// ```text
/// a = λ/μ,  ρ = a/c
/// C(c, a) = (a^c/c! · 1/(1−ρ)) / (Σ_{k<c} a^k/k! + a^c/c! · 1/(1−ρ))
/// W = C(c, a) / (cμ − λ) + 1/μ
/// ```
/// With one server this is exactly [`mm1_sojourn`].
pub fn theoretical_sojourn(
    arrival_rate: f64,
    service_rate: f64,
    servers: usize,
) -> Result<f64, SimError> {
    if servers == 0 {
        return Err(SimError::config("server count must be at least 1"));
    }
    if servers == 1 {
        return mm1_sojourn(arrival_rate, service_rate);
    }
    check_rates(arrival_rate, service_rate)?;

    let capacity = servers as f64 * service_rate;
    if capacity <= arrival_rate {
        return Err(SimError::Instability {
            arrival_rate,
            service_capacity: capacity,
        });
    }

    let offered = arrival_rate / service_rate;
    let wait_probability = erlang_c(servers, offered);
    Ok(wait_probability / (capacity - arrival_rate) + 1.0 / service_rate)
}

/// Probability that an arrival has to wait (Erlang C), for `servers` servers
/// and offered load `a = λ/μ < servers`.
pub fn erlang_c(servers: usize, offered: f64) -> f64 {
    let c = servers as f64;
    let utilisation = offered / c;

    // term walks a^k/k! for k = 0..c
    let mut below = 0.0;
    let mut term = 1.0;
    for k in 0..servers {
        below += term;
        term *= offered / (k + 1) as f64;
    }
    let top = term / (1.0 - utilisation);
    top / (below + top)
}

fn check_rates(arrival_rate: f64, service_rate: f64) -> Result<(), SimError> {
    for (name, rate) in [("arrival rate", arrival_rate), ("service rate", service_rate)] {
        if !(rate.is_finite() && rate > 0.0) {
            return Err(SimError::config(format!("{} must be positive, got {}", name, rate)));
        }
    }
    Ok(())
}
