use anyhow::{anyhow, bail, Context, Result};
use gm_rs::kernel::KernelLifecycle;
use gm_rs::response::{
    calculate_spectrals as spectrals_baseline,
    calculate_spectrals_from_times as spectrals_from_times_baseline, OscillatorConfig,
    OscillatorKernel, OscillatorResponse, Subsampling,
};
use gm_rs::smoothing::{
    konno_ohmachi_smooth as smooth_baseline, rfftfreq, KonnoOhmachiConfig, KonnoOhmachiKernel,
};
use gm_rs::traits::{OscillatorResponse1D, SpectrumSmooth1D};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

const DEFAULT_PYTHON_BIN: &str = "python";

const PY_REFERENCE_SCRIPT: &str = r#"
import json
import math
import sys
import time
import numpy as np

env = json.loads(sys.stdin.read())
op = env["op"]
iters = int(env["iters"])
p = env["payload"]

def _as_array(key):
    return np.asarray(p[key], dtype=float)

def _oscillator(acc, dt, period, damping, first_substep):
    ns = int(10.0 * dt / period - 0.01) + 1 if first_substep else 1
    step = dt / ns
    d = damping
    w = 2.0 * math.pi / period
    wd = math.sqrt(1.0 - d * d) * w
    e = math.exp(-d * w * step)
    sine = e * math.sin(wd * step)
    cosine = e * math.cos(wd * step)
    w2 = w * w
    w3 = w2 * w
    w2i = 1.0 / w2
    wdi = 1.0 / wd
    dw = d * w
    ddtw3 = 2.0 * d / (step * w3)
    n = acc.shape[0]
    sacc = np.zeros(n)
    svel = np.zeros(n)
    sdis = np.zeros(n)
    dis_prev = 0.0
    vel_prev = 0.0
    for i in range(n - 1):
        g = acc[i]
        dug = (acc[i + 1] - g) / ns
        gw2i = g * w2i
        dugw2i = dug * w2i
        dugw2idt = dugw2i / step
        b = dis_prev + gw2i - ddtw3 * dug
        a = wdi * vel_prev + dw * wdi * b + wdi * dugw2idt
        dis = a * sine + b * cosine + ddtw3 * dug - gw2i - dugw2i
        vel = a * (wd * cosine - dw * sine) - b * (wd * sine + dw * cosine) - dugw2idt
        sdis[i] = dis
        svel[i] = vel
        sacc[i] = -2.0 * dw * vel - w2 * dis
        dis_prev = dis
        vel_prev = vel
    return np.concatenate([sacc, svel, sdis])

def _konno_ohmachi(spec, freqs, ko_freqs, b):
    max_ratio = 10.0 ** (3.0 / b)
    min_ratio = 1.0 / max_ratio
    out = np.full(ko_freqs.shape[0], np.nan)
    for i, fc in enumerate(ko_freqs):
        if fc < 1e-6:
            continue
        frat = freqs / fc
        mask = (freqs >= 1e-6) & (frat >= min_ratio) & (frat <= max_ratio)
        f = freqs[mask]
        s = spec[mask]
        if f.size == 0:
            continue
        with np.errstate(divide="ignore", invalid="ignore"):
            x = b * np.log10(f / fc)
            w = (np.sin(x) / x) ** 4
        w[np.abs(f - fc) < 1e-6] = 1.0
        out[i] = np.sum(w * s) / np.sum(w)
    return out

def _compute():
    if op == "oscillator":
        return _oscillator(
            _as_array("acc"),
            float(p["dt"]),
            float(p["period"]),
            float(p["damping"]),
            bool(p["first_substep"]),
        )
    if op == "konno_ohmachi":
        return _konno_ohmachi(
            _as_array("spec"),
            _as_array("freqs"),
            _as_array("ko_freqs"),
            float(p["bandwidth"]),
        )
    raise RuntimeError(f"unsupported op: {op}")

y = _compute()

t0 = time.perf_counter_ns()
for _ in range(iters):
    _compute()
t1 = time.perf_counter_ns()

print(json.dumps({
    "output": [None if math.isnan(v) else v for v in y.tolist()],
    "avg_ns": (t1 - t0) / max(iters, 1),
    "python_version": sys.version.split()[0],
    "numpy_version": np.__version__
}))
"#;

#[derive(Debug, Serialize, Deserialize, Clone)]
struct PythonEval {
    output: Vec<Option<f64>>,
    avg_ns: f64,
    python_version: String,
    numpy_version: String,
}

impl PythonEval {
    /// Reference output with JSON nulls mapped back to NaN.
    fn values(&self) -> Vec<f64> {
        self.output.iter().map(|v| v.unwrap_or(f64::NAN)).collect()
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
struct ContractRow {
    case_id: String,
    samples: usize,
    nan_mismatches: usize,
    pearson_r: f64,
    mae: f64,
    rmse: f64,
    max_abs: f64,
    rust_candidate_ns: f64,
    rust_baseline_ns: f64,
    python_ns: f64,
    speedup_vs_baseline: f64,
    speedup_vs_python: f64,
}

#[derive(Debug, Serialize, Deserialize)]
struct ContractBundle {
    generated_epoch_seconds: u64,
    python_executable: String,
    python_version: String,
    numpy_version: String,
    rows: Vec<ContractRow>,
}

fn main() -> Result<()> {
    let mut args = std::env::args().skip(1);
    match args.next().as_deref() {
        Some("contracts") => run_contracts(),
        _ => {
            eprintln!("Usage:");
            eprintln!("  cargo run -p xtask -- contracts");
            Ok(())
        }
    }
}

struct OscillatorCase {
    case_id: &'static str,
    dt: f64,
    period: f64,
    damping: f64,
    subsampling: Subsampling,
    samples: usize,
}

struct SmoothingCase {
    case_id: &'static str,
    bandwidth: f64,
    sorted_freqs: bool,
    nfft: usize,
    dt: f64,
}

fn run_contracts() -> Result<()> {
    let ts = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    let out_dir = PathBuf::from(format!("target/contracts/{ts}"));
    fs::create_dir_all(&out_dir).context("creating contract output directory")?;

    let python_bin = detect_python_bin();
    let mut rows = Vec::new();
    let mut versions = None;

    let oscillator_cases = [
        OscillatorCase {
            case_id: "oscillator_t1_f64",
            dt: 0.01,
            period: 1.0,
            damping: 0.05,
            subsampling: Subsampling::None,
            samples: 2000,
        },
        OscillatorCase {
            case_id: "oscillator_t0p1_f64",
            dt: 0.005,
            period: 0.1,
            damping: 0.05,
            subsampling: Subsampling::None,
            samples: 4000,
        },
        OscillatorCase {
            case_id: "oscillator_undamped_f64",
            dt: 0.01,
            period: 2.0,
            damping: 0.0,
            subsampling: Subsampling::None,
            samples: 2000,
        },
        OscillatorCase {
            case_id: "oscillator_first_substep_f64",
            dt: 0.02,
            period: 0.05,
            damping: 0.05,
            subsampling: Subsampling::FirstSubstep,
            samples: 1000,
        },
    ];

    for case in &oscillator_cases {
        let acc = synthetic_record(case.samples, case.dt);
        let kernel = OscillatorKernel::try_new(OscillatorConfig {
            period: case.period,
            damping: case.damping,
            dt: case.dt,
            subsampling: case.subsampling,
        })?;

        let mut sacc = vec![0.0; acc.len()];
        let mut svel = vec![0.0; acc.len()];
        let mut sdis = vec![0.0; acc.len()];
        kernel
            .run_into(
                acc.as_slice(),
                sacc.as_mut_slice(),
                svel.as_mut_slice(),
                sdis.as_mut_slice(),
            )
            .map_err(|e| anyhow!("{} candidate execution failed: {e}", case.case_id))?;
        let candidate = [sacc.as_slice(), svel.as_slice(), sdis.as_slice()].concat();

        let times: Vec<f64> = (0..acc.len()).map(|i| i as f64 * case.dt).collect();
        let run_baseline = || -> Result<OscillatorResponse<f64>> {
            let response = match case.subsampling {
                Subsampling::None => spectrals_baseline(&acc, case.dt, case.period, case.damping),
                Subsampling::FirstSubstep => {
                    spectrals_from_times_baseline(&times, &acc, case.period, case.damping)
                }
            };
            response.map_err(|e| anyhow!("{} baseline execution failed: {e}", case.case_id))
        };
        let baseline = flatten_response(run_baseline()?);
        ensure_same_length(case.case_id, &candidate, &baseline)?;
        let baseline_gap = max_abs_error(&candidate, &baseline);
        if baseline_gap != 0.0 {
            bail!(
                "case {} kernel and free function disagree by {baseline_gap:e}",
                case.case_id
            );
        }

        let py = python_reference_eval(
            &python_bin,
            "oscillator",
            json!({
                "acc": acc,
                "dt": case.dt,
                "period": case.period,
                "damping": case.damping,
                "first_substep": case.subsampling == Subsampling::FirstSubstep,
            }),
            5,
        )?;

        let candidate_ns = benchmark_avg_ns(200, || {
            kernel
                .run_into(
                    acc.as_slice(),
                    sacc.as_mut_slice(),
                    svel.as_mut_slice(),
                    sdis.as_mut_slice(),
                )
                .map_err(|e| anyhow!("{} candidate benchmark failed: {e}", case.case_id))
        })?;
        let baseline_ns = benchmark_avg_ns(200, || run_baseline().map(|_| ()))?;

        record_case(
            &mut rows,
            &mut versions,
            case.case_id,
            &candidate,
            py,
            candidate_ns,
            baseline_ns,
        )?;
    }

    let smoothing_cases = [
        SmoothingCase {
            case_id: "konno_ohmachi_b20_f64",
            bandwidth: 20.0,
            sorted_freqs: false,
            nfft: 2048,
            dt: 0.01,
        },
        SmoothingCase {
            case_id: "konno_ohmachi_b188p5_f64",
            bandwidth: 188.5,
            sorted_freqs: false,
            nfft: 8192,
            dt: 0.005,
        },
        SmoothingCase {
            case_id: "konno_ohmachi_b188p5_sorted_f64",
            bandwidth: 188.5,
            sorted_freqs: true,
            nfft: 8192,
            dt: 0.005,
        },
    ];

    for case in &smoothing_cases {
        let freqs = rfftfreq(case.nfft, case.dt);
        let spec = synthetic_spectrum(&freqs);
        let ko_freqs = log_spaced(0.05, 0.5 / case.dt, 120);

        let kernel = KonnoOhmachiKernel::try_new(KonnoOhmachiConfig {
            bandwidth: case.bandwidth,
            sorted_freqs: case.sorted_freqs,
        })?;
        let mut out = vec![0.0; ko_freqs.len()];
        kernel
            .run_into(
                spec.as_slice(),
                freqs.as_slice(),
                ko_freqs.as_slice(),
                out.as_mut_slice(),
            )
            .map_err(|e| anyhow!("{} candidate execution failed: {e}", case.case_id))?;
        let candidate = out.clone();

        let baseline = smooth_baseline(&spec, &freqs, &ko_freqs, case.bandwidth)
            .map_err(|e| anyhow!("{} baseline execution failed: {e}", case.case_id))?;
        ensure_same_length(case.case_id, &candidate, &baseline)?;
        if count_nan_mismatches(&candidate, &baseline) != 0 {
            bail!("case {} kernel and free function disagree on NaNs", case.case_id);
        }

        let py = python_reference_eval(
            &python_bin,
            "konno_ohmachi",
            json!({
                "spec": spec,
                "freqs": freqs,
                "ko_freqs": ko_freqs,
                "bandwidth": case.bandwidth,
            }),
            5,
        )?;

        let candidate_ns = benchmark_avg_ns(50, || {
            kernel
                .run_into(
                    spec.as_slice(),
                    freqs.as_slice(),
                    ko_freqs.as_slice(),
                    out.as_mut_slice(),
                )
                .map_err(|e| anyhow!("{} candidate benchmark failed: {e}", case.case_id))
        })?;
        let baseline_ns = benchmark_avg_ns(50, || {
            smooth_baseline(&spec, &freqs, &ko_freqs, case.bandwidth)
                .map(|_| ())
                .map_err(|e| anyhow!("{} baseline benchmark failed: {e}", case.case_id))
        })?;

        record_case(
            &mut rows,
            &mut versions,
            case.case_id,
            &candidate,
            py,
            candidate_ns,
            baseline_ns,
        )?;
    }

    let (python_version, numpy_version) =
        versions.unwrap_or_else(|| ("unknown".to_string(), "unknown".to_string()));
    let bundle = ContractBundle {
        generated_epoch_seconds: ts,
        python_executable: python_bin.to_string_lossy().into_owned(),
        python_version,
        numpy_version,
        rows,
    };

    write_summary_csv(&out_dir.join("summary.csv"), &bundle.rows)?;
    fs::write(
        out_dir.join("summary.json"),
        serde_json::to_vec_pretty(&bundle).context("serializing summary bundle")?,
    )
    .context("writing summary.json")?;

    println!("Contract artifacts generated in: {}", out_dir.display());
    println!("  - {}", out_dir.join("summary.csv").display());
    println!("  - {}", out_dir.join("summary.json").display());
    println!("  - cases: {}", bundle.rows.len());

    Ok(())
}

/// Acceleration burst shaped like a strong-motion record.
fn synthetic_record(samples: usize, dt: f64) -> Vec<f64> {
    let rise = 0.15 * samples as f64 * dt;
    (0..samples)
        .map(|i| {
            let t = i as f64 * dt;
            let envelope = (t / rise) * (1.0 - t / rise).exp();
            envelope
                * (0.9 * (2.0 * std::f64::consts::PI * 1.3 * t).sin()
                    + 0.5 * (2.0 * std::f64::consts::PI * 4.1 * t + 0.4).sin()
                    + 0.2 * (2.0 * std::f64::consts::PI * 11.7 * t + 1.1).cos())
        })
        .collect()
}

/// Smooth amplitude shape with a resonance and a high-frequency rolloff.
fn synthetic_spectrum(freqs: &[f64]) -> Vec<f64> {
    freqs
        .iter()
        .enumerate()
        .map(|(i, f)| {
            let resonance = 1.0 / (1.0 + ((f - 2.5) / 0.8).powi(2));
            let ripple = 0.15 * (i as f64 * 0.7).sin();
            (1.0 + 3.0 * resonance + ripple) / (1.0 + f / 20.0)
        })
        .collect()
}

fn log_spaced(lo: f64, hi: f64, n: usize) -> Vec<f64> {
    let step = (hi / lo).ln() / (n - 1) as f64;
    (0..n).map(|i| lo * (step * i as f64).exp()).collect()
}

fn flatten_response(response: OscillatorResponse<f64>) -> Vec<f64> {
    let mut out = Vec::with_capacity(3 * response.len());
    out.extend(response.acceleration);
    out.extend(response.velocity);
    out.extend(response.displacement);
    out
}

fn detect_python_bin() -> PathBuf {
    std::env::var_os("PYTHON")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_PYTHON_BIN))
}

fn python_reference_eval(
    python_bin: &Path,
    op: &str,
    payload: serde_json::Value,
    iters: usize,
) -> Result<PythonEval> {
    run_python_eval(
        python_bin,
        PY_REFERENCE_SCRIPT,
        json!({
            "op": op,
            "iters": iters,
            "payload": payload
        }),
    )
}

fn run_python_eval(
    python_bin: &Path,
    script: &str,
    payload: serde_json::Value,
) -> Result<PythonEval> {
    let mut child = Command::new(python_bin)
        .arg("-c")
        .arg(script)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .with_context(|| format!("spawning python interpreter at {}", python_bin.display()))?;

    {
        let stdin = child.stdin.as_mut().context("opening python stdin")?;
        let payload_bytes = serde_json::to_vec(&payload).context("serializing python payload")?;
        stdin
            .write_all(&payload_bytes)
            .context("writing payload to python stdin")?;
    }

    let output = child
        .wait_with_output()
        .context("waiting for python process")?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!("python execution failed: {stderr}");
    }
    let stdout = String::from_utf8(output.stdout).context("parsing python stdout utf8")?;
    let parsed: PythonEval = serde_json::from_str(stdout.trim()).context("parsing python json")?;
    Ok(parsed)
}

fn record_case(
    rows: &mut Vec<ContractRow>,
    versions: &mut Option<(String, String)>,
    case_id: &str,
    candidate: &[f64],
    py: PythonEval,
    candidate_ns: f64,
    baseline_ns: f64,
) -> Result<()> {
    let reference = py.values();
    ensure_same_length(case_id, candidate, &reference)?;

    let (a, b): (Vec<f64>, Vec<f64>) = candidate
        .iter()
        .zip(reference.iter())
        .filter(|(x, y)| x.is_finite() && y.is_finite())
        .map(|(x, y)| (*x, *y))
        .unzip();

    rows.push(ContractRow {
        case_id: case_id.to_string(),
        samples: candidate.len(),
        nan_mismatches: count_nan_mismatches(candidate, &reference),
        pearson_r: pearson(&a, &b),
        mae: mean_abs_error(&a, &b),
        rmse: root_mean_squared_error(&a, &b),
        max_abs: max_abs_error(&a, &b),
        rust_candidate_ns: candidate_ns,
        rust_baseline_ns: baseline_ns,
        python_ns: py.avg_ns,
        speedup_vs_baseline: baseline_ns / candidate_ns,
        speedup_vs_python: py.avg_ns / candidate_ns,
    });

    if versions.is_none() {
        *versions = Some((py.python_version, py.numpy_version));
    }
    Ok(())
}

fn ensure_same_length(case_id: &str, a: &[f64], b: &[f64]) -> Result<()> {
    if a.len() != b.len() {
        bail!(
            "case {case_id} has mismatched output lengths: left={}, right={}",
            a.len(),
            b.len()
        );
    }
    Ok(())
}

fn count_nan_mismatches(a: &[f64], b: &[f64]) -> usize {
    a.iter()
        .zip(b.iter())
        .filter(|(x, y)| x.is_nan() != y.is_nan())
        .count()
}

fn benchmark_avg_ns<F>(iters: usize, mut f: F) -> Result<f64>
where
    F: FnMut() -> Result<()>,
{
    let start = Instant::now();
    for _ in 0..iters {
        f()?;
    }
    Ok(start.elapsed().as_nanos() as f64 / iters as f64)
}

fn mean_abs_error(a: &[f64], b: &[f64]) -> f64 {
    if a.is_empty() {
        return 0.0;
    }
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y).abs())
        .sum::<f64>()
        / a.len() as f64
}

fn root_mean_squared_error(a: &[f64], b: &[f64]) -> f64 {
    if a.is_empty() {
        return 0.0;
    }
    (a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum::<f64>()
        / a.len() as f64)
        .sqrt()
}

fn max_abs_error(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y).abs())
        .fold(0.0, f64::max)
}

fn pearson(a: &[f64], b: &[f64]) -> f64 {
    let n = a.len() as f64;
    let mean_a = a.iter().sum::<f64>() / n;
    let mean_b = b.iter().sum::<f64>() / n;
    let mut cov = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;
    for (x, y) in a.iter().zip(b.iter()) {
        let da = *x - mean_a;
        let db = *y - mean_b;
        cov += da * db;
        var_a += da * da;
        var_b += db * db;
    }
    if var_a == 0.0 || var_b == 0.0 {
        if a == b {
            1.0
        } else {
            0.0
        }
    } else {
        cov / (var_a.sqrt() * var_b.sqrt())
    }
}

fn write_summary_csv(path: &Path, rows: &[ContractRow]) -> Result<()> {
    let mut out = String::new();
    out.push_str("case_id,samples,nan_mismatches,pearson_r,mae,rmse,max_abs,rust_candidate_ns,rust_baseline_ns,python_ns,speedup_vs_baseline,speedup_vs_python\n");
    for row in rows {
        out.push_str(&format!(
            "{},{},{},{:.12},{:.12},{:.12},{:.12},{:.3},{:.3},{:.3},{:.6},{:.6}\n",
            row.case_id,
            row.samples,
            row.nan_mismatches,
            row.pearson_r,
            row.mae,
            row.rmse,
            row.max_abs,
            row.rust_candidate_ns,
            row.rust_baseline_ns,
            row.python_ns,
            row.speedup_vs_baseline,
            row.speedup_vs_python,
        ));
    }
    fs::write(path, out).with_context(|| format!("writing {}", path.display()))
}
