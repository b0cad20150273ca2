//! The torchvision model catalog.
//!
//! Every supported constructor is listed explicitly; names outside the list
//! fail with [`FinetuneError::UnknownModel`].

use crate::error::{FinetuneError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

macro_rules! torchvision_catalog {
    ($($variant:ident => $name:literal,)+) => {
        /// A torchvision classification constructor.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum TorchvisionArch {
            $(
                #[serde(rename = $name)]
                $variant,
            )+
        }

        impl TorchvisionArch {
            /// All catalog entries in declaration order.
            pub const ALL: &'static [TorchvisionArch] = &[$(TorchvisionArch::$variant,)+];

            /// Constructor name as exposed by `torchvision.models`.
            pub fn name(&self) -> &'static str {
                match self {
                    $(Self::$variant => $name,)+
                }
            }
        }

        impl FromStr for TorchvisionArch {
            type Err = FinetuneError;

            fn from_str(s: &str) -> Result<Self> {
                match s {
                    $($name => Ok(Self::$variant),)+
                    other => Err(FinetuneError::unknown_model(other, "torchvision")),
                }
            }
        }
    };
}

torchvision_catalog! {
    Alexnet => "alexnet",
    Resnet18 => "resnet18",
    Resnet34 => "resnet34",
    Resnet50 => "resnet50",
    Resnet101 => "resnet101",
    Resnet152 => "resnet152",
    Resnext50_32x4d => "resnext50_32x4d",
    WideResnet50_2 => "wide_resnet50_2",
    Vgg11Bn => "vgg11_bn",
    Vgg16Bn => "vgg16_bn",
    Vgg19Bn => "vgg19_bn",
    Densenet121 => "densenet121",
    Densenet169 => "densenet169",
    Squeezenet1_1 => "squeezenet1_1",
    MobilenetV2 => "mobilenet_v2",
    MobilenetV3Small => "mobilenet_v3_small",
    MobilenetV3Large => "mobilenet_v3_large",
    EfficientnetB0 => "efficientnet_b0",
    EfficientnetB3 => "efficientnet_b3",
    RegnetY400mf => "regnet_y_400mf",
    RegnetX800mf => "regnet_x_800mf",
    ConvnextTiny => "convnext_tiny",
    ConvnextSmall => "convnext_small",
}

impl TorchvisionArch {
    /// Architecture family, for grouped listings.
    pub fn family(&self) -> &'static str {
        const FAMILIES: [&str; 11] = [
            "wide_resnet",
            "resnext",
            "resnet",
            "vgg",
            "densenet",
            "squeezenet",
            "mobilenet",
            "efficientnet",
            "regnet",
            "convnext",
            "alexnet",
        ];
        let name = self.name();
        FAMILIES
            .into_iter()
            .find(|family| name.starts_with(family))
            .unwrap_or(name)
    }
}

impl fmt::Display for TorchvisionArch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
