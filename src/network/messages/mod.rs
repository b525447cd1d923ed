pub mod chord {
    tonic::include_proto!("chord");
}

mod conversions;
