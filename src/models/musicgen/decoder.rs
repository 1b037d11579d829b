//! Autoregressive MusicGen token decoder.
//!
//! Runs the delayed-codebook generation loop: one first pass through
//! `decoder_model.onnx`, then one pass per token frame through
//! `decoder_with_past_model.onnx` with the KV cache fed back by name.
//!
//! ## Model Signatures
//!
//! **decoder_model.onnx:**
//! - Inputs:
//!   - `encoder_attention_mask`: (batch, seq_len) i64
//!   - `input_ids`: (batch * codebooks, 1) i64
//!   - `encoder_hidden_states`: (batch, seq_len, 768) f32
//! - Outputs:
//!   - `logits`: (batch * codebooks, 1, vocab) f32 or f16
//!   - `present.N.decoder.key` / `.value`, `present.N.encoder.key` / `.value`
//!
//! **decoder_with_past_model.onnx:** same, with `past_key_values.N.*`
//! inputs mirroring the `present.N.*` outputs of the previous step.

use std::borrow::Cow;
use std::cmp::Ordering;
use std::path::Path;

use half::f16;
use ndarray::{Array2, Array3};
use ort::execution_providers::ExecutionProviderDispatch;
use ort::session::{Session, SessionInputValue};
use ort::value::{DynValue, Tensor};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::error::{Result, ServiceError};
use crate::types::{GenerationParams, ModelConfig};

use super::{load_session, NUM_CODEBOOKS};

/// Staggered codebook sequences in delayed token space.
///
/// MusicGen offsets codebook `k` by `k` steps: at step `t` the model
/// emits codebook `k`'s token for frame `t - k`. Positions with no frame
/// yet are masked to the pad token on the input side, and a frame is only
/// complete once all `K` codebooks have reached it.
#[derive(Debug, Clone)]
pub struct DelayPattern<const K: usize> {
    seqs: [Vec<i64>; K],
}

impl<const K: usize> DelayPattern<K> {
    pub fn new() -> Self {
        Self {
            seqs: std::array::from_fn(|_| Vec::new()),
        }
    }

    /// Number of decoder steps recorded so far.
    pub fn len(&self) -> usize {
        self.seqs[0].len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Records the sampled token of each codebook for one step.
    pub fn push(&mut self, ids: [i64; K]) {
        for (seq, id) in self.seqs.iter_mut().zip(ids) {
            seq.push(id);
        }
    }

    /// Next-step decoder input: the last token per codebook, with
    /// codebooks that have not reached their first frame masked to `pad`.
    pub fn last_masked(&self, pad: i64) -> [i64; K] {
        let len = self.len();
        std::array::from_fn(|k| if len > k { self.seqs[k][len - 1] } else { pad })
    }

    /// Number of frames complete across all codebooks.
    pub fn frames_complete(&self) -> usize {
        self.len().saturating_sub(K - 1)
    }

    /// De-delayed frames: frame `f` takes codebook `k`'s token from step
    /// `f + k`. Only complete frames are returned.
    pub fn frames(&self) -> Vec<[i64; K]> {
        (0..self.frames_complete())
            .map(|f| std::array::from_fn(|k| self.seqs[k][f + k]))
            .collect()
    }
}

impl<const K: usize> Default for DelayPattern<K> {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-codebook logits for one decoder step.
pub struct Logits {
    rows: Vec<Vec<f32>>,
}

impl Logits {
    /// Builds logits from a flat `(rows, 1, vocab)` tensor.
    pub fn from_flat(data: Vec<f32>, rows: usize, vocab: usize) -> Result<Self> {
        if rows == 0 || vocab == 0 || data.len() != rows * vocab {
            return Err(ServiceError::model_inference_failed(format!(
                "Unexpected logits layout: {} values for {} rows of {}",
                data.len(),
                rows,
                vocab
            )));
        }
        let rows = data
            .chunks_exact(vocab)
            .map(|chunk| chunk.to_vec())
            .collect();
        Ok(Self { rows })
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    /// Merges a conditional/unconditional batch pair into guided logits:
    /// `uncond + (cond - uncond) * scale`. Rows are laid out with the
    /// conditional half first.
    pub fn apply_guidance(self, scale: f32) -> Result<Self> {
        if self.rows.len() % 2 != 0 {
            return Err(ServiceError::model_inference_failed(format!(
                "Guidance needs an even row count, got {}",
                self.rows.len()
            )));
        }
        let half = self.rows.len() / 2;
        let (cond, uncond) = self.rows.split_at(half);
        let rows = cond
            .iter()
            .zip(uncond)
            .map(|(c, u)| {
                c.iter()
                    .zip(u)
                    .map(|(&c, &u)| u + (c - u) * scale)
                    .collect()
            })
            .collect();
        Ok(Self { rows })
    }

    /// Samples one token per row from the top-k renormalized distribution.
    pub fn sample_top_k<const K: usize>(
        &self,
        top_k: usize,
        rng: &mut impl Rng,
    ) -> Result<[i64; K]> {
        self.to_frame(|row| sample_row(row, top_k, rng))
    }

    /// Greedy decoding: the argmax of each row.
    pub fn argmax<const K: usize>(&self) -> Result<[i64; K]> {
        self.to_frame(|row| {
            row.iter()
                .enumerate()
                .max_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap_or(Ordering::Equal))
                .map(|(i, _)| i as i64)
                .unwrap_or(0)
        })
    }

    fn to_frame<const K: usize>(&self, mut pick: impl FnMut(&[f32]) -> i64) -> Result<[i64; K]> {
        if self.rows.len() != K {
            return Err(ServiceError::model_inference_failed(format!(
                "Expected {} logit rows, got {}",
                K,
                self.rows.len()
            )));
        }
        let picks: Vec<i64> = self.rows.iter().map(|row| pick(row)).collect();
        Ok(std::array::from_fn(|k| picks[k]))
    }
}

/// Samples an index from the softmax over the `top_k` largest logits.
fn sample_row(row: &[f32], top_k: usize, rng: &mut impl Rng) -> i64 {
    let k = top_k.clamp(1, row.len());

    let mut indices: Vec<usize> = (0..row.len()).collect();
    indices.sort_unstable_by(|&a, &b| row[b].partial_cmp(&row[a]).unwrap_or(Ordering::Equal));
    indices.truncate(k);

    // Softmax over the retained logits, shifted for stability
    let max = row[indices[0]];
    let weights: Vec<f32> = indices.iter().map(|&i| (row[i] - max).exp()).collect();
    let total: f32 = weights.iter().sum();

    let mut target = rng.gen::<f32>() * total;
    for (weight, &index) in weights.iter().zip(&indices) {
        target -= weight;
        if target <= 0.0 {
            return index as i64;
        }
    }
    indices[k - 1] as i64
}

/// Autoregressive token decoder over the two MusicGen decoder graphs.
pub struct Decoder {
    decoder: Session,
    decoder_with_past: Session,
    pad_token_id: i64,
}

impl std::fmt::Debug for Decoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Decoder")
            .field("pad_token_id", &self.pad_token_id)
            .finish_non_exhaustive()
    }
}

impl Decoder {
    /// Loads both decoder graphs from the model directory.
    pub fn load(
        model_dir: &Path,
        providers: &[ExecutionProviderDispatch],
        config: &ModelConfig,
    ) -> Result<Self> {
        let decoder = load_session(&model_dir.join("decoder_model.onnx"), providers)?;
        let decoder_with_past =
            load_session(&model_dir.join("decoder_with_past_model.onnx"), providers)?;

        Ok(Self {
            decoder,
            decoder_with_past,
            pad_token_id: config.pad_token_id as i64,
        })
    }

    /// Generates `max_frames` token frames for the given conditioning.
    pub fn generate_tokens(
        &mut self,
        encoder_hidden_states: Array3<f32>,
        encoder_attention_mask: Array2<i64>,
        params: &GenerationParams,
        max_frames: usize,
    ) -> Result<Vec<[i64; NUM_CODEBOOKS]>> {
        self.generate_tokens_with_progress(
            encoder_hidden_states,
            encoder_attention_mask,
            params,
            max_frames,
            |_, _| {},
        )
    }

    /// Generates token frames, reporting `(frames_complete, max_frames)`
    /// after every decoder step.
    pub fn generate_tokens_with_progress<F>(
        &mut self,
        encoder_hidden_states: Array3<f32>,
        encoder_attention_mask: Array2<i64>,
        params: &GenerationParams,
        max_frames: usize,
        on_progress: F,
    ) -> Result<Vec<[i64; NUM_CODEBOOKS]>>
    where
        F: Fn(usize, usize),
    {
        if max_frames == 0 {
            return Ok(Vec::new());
        }

        let guided = params.guidance_scale > 1.0;
        let batch = if guided { 2 } else { 1 };
        let (_, seq_len, hidden_dim) = encoder_hidden_states.dim();

        // Conditional hidden states, plus an all-zeros row for the
        // unconditional half of the guidance batch.
        let mut hidden: Vec<f32> = Vec::with_capacity(batch * seq_len * hidden_dim);
        hidden.extend(encoder_hidden_states.iter().copied());
        if guided {
            hidden.extend(std::iter::repeat(0.0).take(seq_len * hidden_dim));
        }

        let mut mask: Vec<i64> = encoder_attention_mask.iter().copied().collect();
        if guided {
            let cond_mask = mask.clone();
            mask.extend(cond_mask);
        }

        let mut rng = ChaCha8Rng::seed_from_u64(params.seed);
        let mut delay = DelayPattern::<NUM_CODEBOOKS>::new();
        let mut kv_cache: Vec<(String, DynValue)> = Vec::new();

        // The last K-1 steps only flush the delayed tail
        let total_steps = max_frames + NUM_CODEBOOKS - 1;

        for step in 0..total_steps {
            let frame_input = if step == 0 {
                [self.pad_token_id; NUM_CODEBOOKS]
            } else {
                delay.last_masked(self.pad_token_id)
            };
            let mut input_ids = Vec::with_capacity(batch * NUM_CODEBOOKS);
            for _ in 0..batch {
                input_ids.extend_from_slice(&frame_input);
            }

            let input_ids_tensor =
                Tensor::from_array(([batch * NUM_CODEBOOKS, 1], input_ids)).map_err(|e| {
                    ServiceError::model_inference_failed(format!(
                        "Failed to create input_ids tensor: {}",
                        e
                    ))
                })?;
            let mask_tensor =
                Tensor::from_array(([batch, seq_len], mask.clone())).map_err(|e| {
                    ServiceError::model_inference_failed(format!(
                        "Failed to create encoder_attention_mask tensor: {}",
                        e
                    ))
                })?;

            // Scope the session outputs so views into the KV cache are
            // released before the cache is updated below.
            let (mut logits, fresh_kv) = {
                let mut outputs = if step == 0 {
                    let hidden_tensor =
                        Tensor::from_array(([batch, seq_len, hidden_dim], hidden.clone()))
                            .map_err(|e| {
                                ServiceError::model_inference_failed(format!(
                                    "Failed to create encoder_hidden_states tensor: {}",
                                    e
                                ))
                            })?;
                    self.decoder
                        .run(ort::inputs![
                            "encoder_attention_mask" => mask_tensor,
                            "input_ids" => input_ids_tensor,
                            "encoder_hidden_states" => hidden_tensor,
                        ])
                        .map_err(|e| {
                            ServiceError::model_inference_failed(format!(
                                "Decoder inference failed: {}",
                                e
                            ))
                        })?
                } else {
                    let mut inputs: Vec<(Cow<'static, str>, SessionInputValue<'_>)> = vec![
                        ("encoder_attention_mask".into(), mask_tensor.into()),
                        ("input_ids".into(), input_ids_tensor.into()),
                    ];
                    for (name, value) in &kv_cache {
                        inputs.push((Cow::Owned(name.clone()), value.view().into()));
                    }
                    self.decoder_with_past.run(inputs).map_err(|e| {
                        ServiceError::model_inference_failed(format!(
                            "Decoder (with past) inference failed: {}",
                            e
                        ))
                    })?
                };

                let logits_value: DynValue = outputs.remove("logits").ok_or_else(|| {
                    ServiceError::model_inference_failed("logits not found in output")
                })?;
                let logits = extract_logits(&logits_value)?;

                // The with-past graph re-emits decoder KV entries each
                // step; encoder entries persist from the first pass.
                let present: Vec<String> = outputs
                    .keys()
                    .filter(|name| name.starts_with("present"))
                    .map(|name| name.to_string())
                    .collect();
                let mut fresh: Vec<(String, DynValue)> = Vec::with_capacity(present.len());
                for name in present {
                    if let Some(value) = outputs.remove(name.as_str()) {
                        fresh.push((name.replacen("present", "past_key_values", 1), value));
                    }
                }

                (logits, fresh)
            };

            if guided {
                logits = logits.apply_guidance(params.guidance_scale)?;
            }

            let frame = if params.use_sampling {
                logits.sample_top_k::<NUM_CODEBOOKS>(params.top_k, &mut rng)?
            } else {
                logits.argmax::<NUM_CODEBOOKS>()?
            };
            delay.push(frame);

            for (key, value) in fresh_kv {
                match kv_cache.iter_mut().find(|(existing, _)| *existing == key) {
                    Some(slot) => slot.1 = value,
                    None => kv_cache.push((key, value)),
                }
            }

            on_progress(delay.frames_complete(), max_frames);
        }

        let mut frames = delay.frames();
        frames.truncate(max_frames);
        Ok(frames)
    }
}

/// Extracts step logits as f32 rows, accepting f16 or f32 tensors.
fn extract_logits(value: &DynValue) -> Result<Logits> {
    let (shape, data) = if let Ok((shape, data)) = value.try_extract_tensor::<f32>() {
        (shape.to_vec(), data.to_vec())
    } else if let Ok((shape, data)) = value.try_extract_tensor::<f16>() {
        (
            shape.to_vec(),
            data.iter().map(|&v| f32::from(v)).collect(),
        )
    } else {
        return Err(ServiceError::model_inference_failed(
            "Logits must be either f16 or f32",
        ));
    };

    let rows = shape.first().map(|&d| d as usize).unwrap_or(0);
    let vocab = shape.last().map(|&d| d as usize).unwrap_or(0);
    Logits::from_flat(data, rows, vocab)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_pattern_masks_until_codebook_starts() {
        let mut delay = DelayPattern::<4>::new();
        assert_eq!(delay.last_masked(99), [99; 4]);

        delay.push([10, 11, 12, 13]);
        // After one step only codebook 0 has reached a real frame
        assert_eq!(delay.last_masked(99), [10, 99, 99, 99]);

        delay.push([20, 21, 22, 23]);
        assert_eq!(delay.last_masked(99), [20, 21, 99, 99]);

        delay.push([30, 31, 32, 33]);
        delay.push([40, 41, 42, 43]);
        assert_eq!(delay.last_masked(99), [40, 41, 42, 43]);
    }

    #[test]
    fn delay_pattern_frames_complete_after_k_steps() {
        let mut delay = DelayPattern::<4>::new();
        for step in 0..3 {
            delay.push([step; 4]);
            assert_eq!(delay.frames_complete(), 0);
        }
        delay.push([3; 4]);
        assert_eq!(delay.frames_complete(), 1);
        delay.push([4; 4]);
        assert_eq!(delay.frames_complete(), 2);
    }

    #[test]
    fn delay_pattern_de_delays_staggered_sequences() {
        let mut delay = DelayPattern::<4>::new();
        // Step t emits token 100*k + t for codebook k
        for t in 0..6_i64 {
            delay.push([t, 100 + t, 200 + t, 300 + t]);
        }
        let frames = delay.frames();
        assert_eq!(frames.len(), 3);
        // Frame f takes codebook k's token from step f + k
        assert_eq!(frames[0], [0, 101, 202, 303]);
        assert_eq!(frames[1], [1, 102, 203, 304]);
        assert_eq!(frames[2], [2, 103, 204, 305]);
    }

    #[test]
    fn logits_from_flat_validates_layout() {
        assert!(Logits::from_flat(vec![0.0; 8], 4, 2).is_ok());
        assert!(Logits::from_flat(vec![0.0; 7], 4, 2).is_err());
        assert!(Logits::from_flat(vec![], 0, 0).is_err());
    }

    #[test]
    fn guidance_interpolates_past_unconditional() {
        // One codebook, vocab 2: cond = [2, 0], uncond = [0, 0]
        let logits = Logits::from_flat(vec![2.0, 0.0, 0.0, 0.0], 2, 2).unwrap();
        let guided = logits.apply_guidance(3.0).unwrap();
        assert_eq!(guided.num_rows(), 1);
        // 0 + (2 - 0) * 3 = 6
        let frame = guided.argmax::<1>().unwrap();
        assert_eq!(frame, [0]);
        assert_eq!(guided.rows[0], vec![6.0, 0.0]);
    }

    #[test]
    fn guidance_rejects_odd_row_count() {
        let logits = Logits::from_flat(vec![0.0; 6], 3, 2).unwrap();
        assert!(logits.apply_guidance(3.0).is_err());
    }

    #[test]
    fn top_k_of_one_is_greedy() {
        let logits = Logits::from_flat(vec![0.0, 5.0, 1.0, 9.0, 0.0, 1.0], 2, 3).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let sampled = logits.sample_top_k::<2>(1, &mut rng).unwrap();
        let greedy = logits.argmax::<2>().unwrap();
        assert_eq!(sampled, greedy);
        assert_eq!(greedy, [1, 0]);
    }

    #[test]
    fn sampling_is_deterministic_per_seed() {
        let logits = Logits::from_flat((0..2048).map(|i| (i % 13) as f32).collect(), 1, 2048).unwrap();
        let mut rng_a = ChaCha8Rng::seed_from_u64(7);
        let mut rng_b = ChaCha8Rng::seed_from_u64(7);
        let a = logits.sample_top_k::<1>(250, &mut rng_a).unwrap();
        let b = logits.sample_top_k::<1>(250, &mut rng_b).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn sampling_stays_within_top_k() {
        // Row where index 3 dominates; with k=2 only indices 3 and 1 are eligible
        let logits = Logits::from_flat(vec![0.0, 4.0, 1.0, 8.0], 1, 4).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(123);
        for _ in 0..50 {
            let [id] = logits.sample_top_k::<1>(2, &mut rng).unwrap();
            assert!(id == 3 || id == 1, "sampled {} outside top-2", id);
        }
    }

    #[test]
    fn row_count_mismatch_is_an_error() {
        let logits = Logits::from_flat(vec![0.0; 6], 3, 2).unwrap();
        assert!(logits.argmax::<4>().is_err());
    }
}
