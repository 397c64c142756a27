mod test_send_streams;
