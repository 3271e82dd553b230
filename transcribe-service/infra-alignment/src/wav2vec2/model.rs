//! Wav2Vec2ForCTC forward pass (feature encoder, transformer, CTC head).

use std::path::Path;

use candle_core::{Module, Result, Tensor, D};
use candle_nn::{Conv1d, Conv1dConfig, Linear, VarBuilder};
use serde::Deserialize;

use crate::AlignError;

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct Wav2Vec2ModelConfig {
    pub hidden_size: usize,
    pub num_hidden_layers: usize,
    pub num_attention_heads: usize,
    pub intermediate_size: usize,
    pub conv_dim: Vec<usize>,
    pub conv_kernel: Vec<usize>,
    pub conv_stride: Vec<usize>,
    pub num_conv_pos_embeddings: usize,
    pub num_conv_pos_embedding_groups: usize,
    #[serde(default = "default_eps")]
    pub layer_norm_eps: f64,
    pub pad_token_id: usize,
    pub vocab_size: usize,
    #[serde(default = "default_feat_extract_norm")]
    pub feat_extract_norm: String,
    #[serde(default = "default_conv_bias")]
    pub conv_bias: bool,
}

fn default_eps() -> f64 {
    1e-5
}

fn default_feat_extract_norm() -> String {
    "group".to_string()
}

fn default_conv_bias() -> bool {
    false
}

impl Wav2Vec2ModelConfig {
    pub fn load(path: &Path) -> std::result::Result<Self, AlignError> {
        let data =
            std::fs::read_to_string(path).map_err(|e| AlignError::io("read model config", e))?;
        serde_json::from_str(&data).map_err(|e| AlignError::json("parse model config", e))
    }
}

// candle's fused layer_norm has no CUDA kernel, so normalize with plain ops.
struct LayerNorm {
    weight: Tensor,
    bias: Tensor,
    eps: f64,
}

impl LayerNorm {
    fn load(size: usize, eps: f64, vb: VarBuilder) -> Result<Self> {
        Ok(Self {
            weight: vb.get(size, "weight")?,
            bias: vb.get(size, "bias")?,
            eps,
        })
    }

    fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        let hidden = self.weight.dim(0)? as f64;
        let mean = (xs.sum_keepdim(D::Minus1)? / hidden)?;
        let centered = xs.broadcast_sub(&mean)?;
        let var = (centered.sqr()?.sum_keepdim(D::Minus1)? / hidden)?;
        let normed = centered.broadcast_div(&(var + self.eps)?.sqrt()?)?;
        normed.broadcast_mul(&self.weight)?.broadcast_add(&self.bias)
    }
}

struct ConvSpec {
    in_channels: usize,
    out_channels: usize,
    kernel: usize,
    stride: usize,
    bias: bool,
    layer_norm: bool,
}

struct ConvLayer {
    conv: Conv1d,
    layer_norm: Option<LayerNorm>,
}

impl ConvLayer {
    fn load(spec: ConvSpec, eps: f64, vb: VarBuilder) -> Result<Self> {
        let cfg = Conv1dConfig {
            stride: spec.stride,
            ..Default::default()
        };
        let conv = if spec.bias {
            candle_nn::conv1d(
                spec.in_channels,
                spec.out_channels,
                spec.kernel,
                cfg,
                vb.pp("conv"),
            )?
        } else {
            candle_nn::conv1d_no_bias(
                spec.in_channels,
                spec.out_channels,
                spec.kernel,
                cfg,
                vb.pp("conv"),
            )?
        };
        let layer_norm = if spec.layer_norm {
            Some(LayerNorm::load(spec.out_channels, eps, vb.pp("layer_norm"))?)
        } else {
            None
        };
        Ok(Self { conv, layer_norm })
    }

    fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        let xs = self.conv.forward(xs)?;
        let xs = match &self.layer_norm {
            Some(ln) => ln.forward(&xs.transpose(1, 2)?)?.transpose(1, 2)?.contiguous()?,
            None => xs,
        };
        xs.gelu()
    }
}

fn load_feature_encoder(cfg: &Wav2Vec2ModelConfig, vb: VarBuilder) -> Result<Vec<ConvLayer>> {
    (0..cfg.conv_dim.len())
        .map(|i| {
            let layer_norm = cfg.feat_extract_norm == "layer"
                || (cfg.feat_extract_norm == "group" && i == 0);
            ConvLayer::load(
                ConvSpec {
                    in_channels: if i == 0 { 1 } else { cfg.conv_dim[i - 1] },
                    out_channels: cfg.conv_dim[i],
                    kernel: cfg.conv_kernel[i],
                    stride: cfg.conv_stride[i],
                    bias: cfg.conv_bias,
                    layer_norm,
                },
                cfg.layer_norm_eps,
                vb.pp(format!("conv_layers.{i}")),
            )
        })
        .collect()
}

/// Positional convolution; checkpoints store it weight-normalized
/// (`weight_g`/`weight_v`), older ones as a plain `weight`.
fn load_positional_conv(cfg: &Wav2Vec2ModelConfig, vb: VarBuilder) -> Result<Conv1d> {
    let channels = cfg.hidden_size;
    let kernel = cfg.num_conv_pos_embeddings;
    let conv_cfg = Conv1dConfig {
        padding: kernel / 2,
        groups: cfg.num_conv_pos_embedding_groups,
        ..Default::default()
    };
    let per_group = channels / conv_cfg.groups;

    let weight = match vb.get((channels, per_group, kernel), "weight_v") {
        Ok(v) => {
            let g = vb
                .get((1, 1, kernel), "weight_g")
                .or_else(|_| vb.get((channels, 1, 1), "weight_g"))?;
            if g.dims3()? == (1, 1, kernel) {
                let norm = v.sqr()?.sum_keepdim(0)?.sum_keepdim(1)?.sqrt()?;
                v.broadcast_div(&norm)?.broadcast_mul(&g)?
            } else {
                let (o, ig, k) = v.dims3()?;
                let norm = v
                    .reshape((o, ig * k))?
                    .sqr()?
                    .sum_keepdim(1)?
                    .sqrt()?
                    .unsqueeze(2)?;
                v.broadcast_div(&norm)?.broadcast_mul(&g)?
            }
        }
        Err(_) => vb.get((channels, per_group, kernel), "weight")?,
    };
    let bias = vb.get(channels, "bias")?;
    Ok(Conv1d::new(weight, Some(bias), conv_cfg))
}

struct SelfAttention {
    q: Linear,
    k: Linear,
    v: Linear,
    out: Linear,
    heads: usize,
    head_dim: usize,
    scale: f64,
}

impl SelfAttention {
    fn load(cfg: &Wav2Vec2ModelConfig, vb: VarBuilder) -> Result<Self> {
        let h = cfg.hidden_size;
        let head_dim = h / cfg.num_attention_heads;
        Ok(Self {
            q: candle_nn::linear(h, h, vb.pp("q_proj"))?,
            k: candle_nn::linear(h, h, vb.pp("k_proj"))?,
            v: candle_nn::linear(h, h, vb.pp("v_proj"))?,
            out: candle_nn::linear(h, h, vb.pp("out_proj"))?,
            heads: cfg.num_attention_heads,
            head_dim,
            scale: (head_dim as f64).powf(-0.5),
        })
    }

    fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        let (b, t, _) = xs.dims3()?;
        let split_heads = |x: Tensor| {
            x.reshape((b, t, self.heads, self.head_dim))?
                .transpose(1, 2)?
                .contiguous()
        };
        let q = split_heads((self.q.forward(xs)? * self.scale)?)?;
        let k = split_heads(self.k.forward(xs)?)?;
        let v = split_heads(self.v.forward(xs)?)?;

        let scores = q.matmul(&k.transpose(2, 3)?.contiguous()?)?;
        let attn = candle_nn::ops::softmax(&scores, D::Minus1)?;
        let merged = attn
            .matmul(&v)?
            .transpose(1, 2)?
            .contiguous()?
            .reshape((b, t, self.heads * self.head_dim))?;
        self.out.forward(&merged)
    }
}

struct EncoderLayer {
    attention: SelfAttention,
    attention_norm: LayerNorm,
    up: Linear,
    down: Linear,
    final_norm: LayerNorm,
}

impl EncoderLayer {
    fn load(cfg: &Wav2Vec2ModelConfig, vb: VarBuilder) -> Result<Self> {
        let ff = vb.pp("feed_forward");
        Ok(Self {
            attention: SelfAttention::load(cfg, vb.pp("attention"))?,
            attention_norm: LayerNorm::load(
                cfg.hidden_size,
                cfg.layer_norm_eps,
                vb.pp("layer_norm"),
            )?,
            up: candle_nn::linear(
                cfg.hidden_size,
                cfg.intermediate_size,
                ff.pp("intermediate_dense"),
            )?,
            down: candle_nn::linear(
                cfg.intermediate_size,
                cfg.hidden_size,
                ff.pp("output_dense"),
            )?,
            final_norm: LayerNorm::load(
                cfg.hidden_size,
                cfg.layer_norm_eps,
                vb.pp("final_layer_norm"),
            )?,
        })
    }

    /// Pre-norm block, as in the "stable layer norm" checkpoints.
    fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        let h = (xs + self.attention.forward(&self.attention_norm.forward(xs)?)?)?;
        let ff = self.down.forward(&self.up.forward(&self.final_norm.forward(&h)?)?.gelu()?)?;
        &h + ff
    }
}

pub(crate) struct Wav2Vec2ForCtc {
    feature_encoder: Vec<ConvLayer>,
    projection_norm: LayerNorm,
    projection: Linear,
    positional_conv: Conv1d,
    layers: Vec<EncoderLayer>,
    encoder_norm: LayerNorm,
    lm_head: Linear,
}

impl Wav2Vec2ForCtc {
    pub fn load(cfg: &Wav2Vec2ModelConfig, vb: VarBuilder) -> Result<Self> {
        let w = vb.pp("wav2vec2");
        let encoder = w.pp("encoder");
        let feature_dim = *cfg.conv_dim.last().unwrap_or(&cfg.hidden_size);
        let projection = w.pp("feature_projection");

        Ok(Self {
            feature_encoder: load_feature_encoder(cfg, w.pp("feature_extractor"))?,
            projection_norm: LayerNorm::load(
                feature_dim,
                cfg.layer_norm_eps,
                projection.pp("layer_norm"),
            )?,
            projection: candle_nn::linear(
                feature_dim,
                cfg.hidden_size,
                projection.pp("projection"),
            )?,
            positional_conv: load_positional_conv(cfg, encoder.pp("pos_conv_embed").pp("conv"))?,
            layers: (0..cfg.num_hidden_layers)
                .map(|i| EncoderLayer::load(cfg, encoder.pp(format!("layers.{i}"))))
                .collect::<Result<_>>()?,
            encoder_norm: LayerNorm::load(
                cfg.hidden_size,
                cfg.layer_norm_eps,
                encoder.pp("layer_norm"),
            )?,
            lm_head: candle_nn::linear(cfg.hidden_size, cfg.vocab_size, vb.pp("lm_head"))?,
        })
    }

    /// `audio` is `(batch, samples)`; returns logits `(batch, frames, vocab)`.
    pub fn forward(&self, audio: &Tensor) -> Result<Tensor> {
        let mut h = audio.unsqueeze(1)?;
        for layer in &self.feature_encoder {
            h = layer.forward(&h)?;
        }
        let h = h.transpose(1, 2)?.contiguous()?;
        let h = self.projection.forward(&self.projection_norm.forward(&h)?)?;

        let frames = h.dim(1)?;
        let positional = self
            .positional_conv
            .forward(&h.transpose(1, 2)?.contiguous()?)?
            .narrow(2, 0, frames)?
            .gelu()?
            .transpose(1, 2)?
            .contiguous()?;
        let mut h = (h + positional)?;
        for layer in &self.layers {
            h = layer.forward(&h)?;
        }
        let h = self.encoder_norm.forward(&h)?;
        self.lm_head.forward(&h)
    }
}
