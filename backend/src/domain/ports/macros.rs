//! Defines helper macros for generating domain port error enums.
//!
//! Besides the enum and its snake-case constructors, the macro generates the
//! mapping into [`crate::domain::Error`]: variants listed under
//! `unavailable` become [`ErrorCode::ServiceUnavailable`] and every other
//! variant becomes [`ErrorCode::InternalError`].
//!
//! [`ErrorCode::ServiceUnavailable`]: crate::domain::ErrorCode::ServiceUnavailable
//! [`ErrorCode::InternalError`]: crate::domain::ErrorCode::InternalError

macro_rules! define_port_error {
    (@ctor $variant:ident) => {
        ::paste::paste! {
            #[doc = concat!("Construct [`Self::", stringify!($variant), "`].")]
            pub fn [<$variant:snake>]() -> Self {
                Self::$variant
            }
        }
    };

    (@ctor $variant:ident { $($field:ident : $ty:ty),* $(,)? }) => {
        define_port_error!(@ctor_impl $variant () () $( $field : $ty, )*);
    };

    (@ctor_impl $variant:ident ($($params:tt)*) ($($inits:tt)*) ) => {
        ::paste::paste! {
            #[doc = concat!("Construct [`Self::", stringify!($variant), "`].")]
            pub fn [<$variant:snake>]($($params)*) -> Self {
                Self::$variant { $($inits)* }
            }
        }
    };

    (@ctor_impl $variant:ident ($($params:tt)*) ($($inits:tt)*) $field:ident : $ty:ty, $($rest:tt)*) => {
        define_port_error!(
            @ctor_impl
            $variant
            ($($params)* $field: impl Into<$ty>,)
            ($($inits)* $field: $field.into(),)
            $($rest)*
        );
    };
    (
        $(#[$outer:meta])*
        pub enum $name:ident {
            $(
                $(#[$variant_meta:meta])*
                $variant:ident $( { $($field:ident : $ty:ty),* $(,)? } )? => $message:expr
            ),* $(,)?
        }
        unavailable: [$($unavailable:ident),* $(,)?]
    ) => {
        $(#[$outer])*
        #[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
        pub enum $name {
            $(
                $(#[$variant_meta])*
                #[error($message)]
                $variant $( { $($field : $ty),* } )?,
            )*
        }

        impl $name {
            $(
                define_port_error!(@ctor $variant $( { $($field : $ty),* } )?);
            )*
        }

        impl From<$name> for $crate::domain::Error {
            #[allow(unreachable_patterns)]
            fn from(error: $name) -> Self {
                match &error {
                    $( $name::$unavailable { .. } => {
                        $crate::domain::Error::service_unavailable(error.to_string())
                    } )*
                    _ => $crate::domain::Error::internal(error.to_string()),
                }
            }
        }
    };
}

pub(crate) use define_port_error;
