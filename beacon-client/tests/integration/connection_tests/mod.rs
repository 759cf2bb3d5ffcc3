mod test_negotiation_failure;
mod test_renegotiation;
